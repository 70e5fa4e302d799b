use kestrel_core::{ClusterError, Result};
use std::path::Path;
use std::time::Duration;

/// Where a pod's service-account credentials are mounted
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for `ApiClient`
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// API server URL (e.g., "https://10.96.0.1:443")
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Extra PEM root certificate to trust
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Timeout for establishing a connection (all requests)
    pub connect_timeout: Duration,
    /// Timeout for unary requests. Watches are long-lived and only bounded by
    /// `connect_timeout`.
    pub request_timeout: Duration,
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            ca_cert_pem: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Configuration for a scheduler running inside the cluster, from the
    /// service environment variables and the mounted service account
    pub fn in_cluster() -> Result<Self> {
        Self::from_service_account(
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
            Path::new(SERVICE_ACCOUNT_DIR),
        )
    }

    fn from_service_account(
        host: Option<String>,
        port: Option<String>,
        account_dir: &Path,
    ) -> Result<Self> {
        let (host, port) = match (host, port) {
            (Some(h), Some(p)) if !h.is_empty() && !p.is_empty() => (h, p),
            _ => {
                return Err(ClusterError::invalid_config(
                    "KUBERNETES_SERVICE_HOST and KUBERNETES_SERVICE_PORT are not set",
                    "Run inside a cluster, or pass --api-url to point at an API server",
                ))
            }
        };

        // IPv6 literals need brackets in a URL
        let host = if host.contains(':') {
            format!("[{}]", host)
        } else {
            host
        };

        Self::new(format!("https://{}:{}", host, port))
            .with_token_file(&account_dir.join("token"))?
            .with_ca_file(&account_dir.join("ca.crt"))
    }

    /// Read the bearer token from a file
    pub fn with_token_file(mut self, path: &Path) -> Result<Self> {
        let token = read_file(path)?;
        let token = String::from_utf8_lossy(&token).trim().to_string();
        if token.is_empty() {
            return Err(ClusterError::invalid_config(
                format!("Token file {} is empty", path.display()),
                "Check that the service account token is mounted",
            ));
        }
        self.token = Some(token);
        Ok(self)
    }

    /// Trust the PEM certificate(s) in a file
    pub fn with_ca_file(mut self, path: &Path) -> Result<Self> {
        self.ca_cert_pem = Some(read_file(path)?);
        Ok(self)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        ClusterError::invalid_config(
            format!("Failed to read {}: {}", path.display(), e),
            format!("Verify that {} exists and is readable", path.display()),
        )
    })
}
