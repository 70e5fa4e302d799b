use crate::config::ApiClientConfig;
use crate::traits::{ClusterClient, PodWatch};
use crate::watch::decode_watch_stream;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Node};
use kestrel_core::{binding_for, ClusterError, PodFilter, Result};
use reqwest::{Certificate, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// HTTP client for a Kubernetes-compatible API server
pub struct ApiClient {
    base_url: String,
    /// Unary requests, bounded by the request timeout
    client: Client,
    /// Watches, bounded only by the connect timeout
    watch_client: Client,
    token: Option<String>,
}

/// The part of a list response we care about
#[derive(Debug, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl ApiClient {
    /// Client without credentials or timeouts, for local API servers
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            watch_client: Client::new(),
            token: None,
        }
    }

    pub fn from_config(config: &ApiClientConfig) -> Result<Self> {
        let certificate = config
            .ca_cert_pem
            .as_deref()
            .map(Certificate::from_pem)
            .transpose()
            .map_err(|e| {
                ClusterError::invalid_config(
                    format!("Invalid CA certificate: {}", e),
                    "Provide a PEM encoded certificate",
                )
            })?;

        let build = |timeout: Option<std::time::Duration>| {
            let mut builder = Client::builder().connect_timeout(config.connect_timeout);
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(cert) = &certificate {
                builder = builder.add_root_certificate(cert.clone());
            }
            builder.build().map_err(|e| {
                ClusterError::invalid_config(
                    format!("Failed to build HTTP client: {}", e),
                    "Check the TLS configuration",
                )
            })
        };

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: build(Some(config.request_timeout))?,
            watch_client: build(None)?,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, resource_key: &str) -> Result<Response> {
        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClusterError::transport(format!("HTTP request failed: {}", e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(error_for_status(status, resource_key, body))
    }
}

/// Map a non-success HTTP status onto the error taxonomy
fn error_for_status(status: StatusCode, resource_key: &str, body: String) -> ClusterError {
    match status {
        StatusCode::CONFLICT => ClusterError::conflict(resource_key),
        StatusCode::NOT_FOUND => ClusterError::not_found(resource_key),
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            ClusterError::transport(format!("{} failed with status {}: {}", resource_key, s, body))
        }
        s => ClusterError::rejected(s.as_u16(), body),
    }
}

#[async_trait]
impl ClusterClient for ApiClient {
    /// GET /api/v1/pods?watch=true&fieldSelector=...
    async fn watch_pods(&self, filter: &PodFilter) -> Result<PodWatch> {
        let url = format!("{}/api/v1/pods", self.base_url);
        let selector = filter.field_selector();
        debug!("WATCH {} ({})", url, selector);

        let request = self
            .watch_client
            .get(&url)
            .query(&[("watch", "true"), ("fieldSelector", selector.as_str())]);
        let resp = self.send(request, "pods").await?;

        Ok(decode_watch_stream(resp.bytes_stream()))
    }

    /// GET /api/v1/nodes
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let url = format!("{}/api/v1/nodes", self.base_url);
        debug!("GET {}", url);

        let resp = self.send(self.client.get(&url), "nodes").await?;
        let list = resp
            .json::<ItemList<Node>>()
            .await
            .map_err(|e| ClusterError::decode(format!("Failed to parse node list: {}", e)))?;

        Ok(list.items)
    }

    /// POST /api/v1/namespaces/{namespace}/pods/{name}/binding
    async fn bind_pod(&self, namespace: &str, pod_name: &str, node_name: &str) -> Result<()> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}/binding",
            self.base_url, namespace, pod_name
        );
        debug!("POST {}", url);

        let binding = binding_for(namespace, pod_name, node_name);
        let key = format!("pods/{}/{}", namespace, pod_name);
        self.send(self.client.post(&url).json(&binding), &key).await?;

        Ok(())
    }

    /// POST /api/v1/namespaces/{namespace}/events
    async fn create_event(&self, event: &Event) -> Result<Event> {
        let namespace = event.metadata.namespace.as_deref().unwrap_or("default");
        let url = format!("{}/api/v1/namespaces/{}/events", self.base_url, namespace);
        debug!("POST {}", url);

        let key = format!("events/{}", namespace);
        let resp = self.send(self.client.post(&url).json(event), &key).await?;

        resp.json::<Event>()
            .await
            .map_err(|e| ClusterError::decode(format!("Failed to parse event: {}", e)))
    }
}
