use clap::Parser;
use kestrel_client::{ApiClient, ApiClientConfig, ClusterClient};
use kestrel_core::DEFAULT_SCHEDULER_NAME;
use kestrel_scheduler::{RetryPolicy, Scheduler, SchedulerConfig, SelectionPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "kestrel", about = "Kestrel custom pod scheduler")]
struct Cli {
    /// Scheduler name pods must request in spec.schedulerName
    #[arg(long, env = "KESTREL_SCHEDULER_NAME", default_value = DEFAULT_SCHEDULER_NAME)]
    scheduler_name: String,

    /// API server URL. Uses the in-cluster service account when absent.
    #[arg(long, env = "KESTREL_API_URL")]
    api_url: Option<String>,

    /// File holding a bearer token for the API server
    #[arg(long, env = "KESTREL_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Node selection policy: first-listed or lowest-name
    #[arg(long, env = "KESTREL_SELECTION", default_value_t = SelectionPolicy::default())]
    selection: SelectionPolicy,

    /// Attempts per list/bind/event call before giving up on a pod
    #[arg(long, env = "KESTREL_RETRY_ATTEMPTS", default_value_t = 3)]
    retry_attempts: u32,

    /// Consecutive pod watch failures tolerated before exiting
    #[arg(long, env = "KESTREL_MAX_WATCH_RESTARTS", default_value_t = 5)]
    max_watch_restarts: u32,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let client = create_client(&cli)?;

    let config = SchedulerConfig {
        scheduler_name: cli.scheduler_name.clone(),
        retry: RetryPolicy {
            max_attempts: cli.retry_attempts,
            ..Default::default()
        },
        max_watch_restarts: cli.max_watch_restarts,
        ..Default::default()
    };

    info!(
        "Starting kestrel scheduler '{}' with {} selection",
        config.scheduler_name, cli.selection
    );

    let scheduler = Scheduler::new(client, cli.selection.selector(), config);

    let token = CancellationToken::new();
    let scheduler_token = token.clone();
    let mut scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_token).await });

    let result = tokio::select! {
        result = &mut scheduler_handle => result,
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;
            info!("Shutting down gracefully...");
            token.cancel();
            // A cycle in flight is allowed to finish
            scheduler_handle.await
        }
    };

    match result {
        Ok(Ok(())) => {
            info!("Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Scheduler stopped: {}", e);
            Err(e.into())
        }
        Err(e) => Err(miette::miette!("Scheduler task failed: {}", e)),
    }
}

/// Build the API client from flags, falling back to in-cluster configuration
fn create_client(cli: &Cli) -> miette::Result<Arc<dyn ClusterClient>> {
    let mut config = match &cli.api_url {
        Some(url) => ApiClientConfig::new(url.clone()),
        None => ApiClientConfig::in_cluster()?,
    };

    if let Some(path) = &cli.token_file {
        config = config.with_token_file(path)?;
    }

    info!("Using API server at {}", config.base_url);

    let client = ApiClient::from_config(&config)?;
    Ok(Arc::new(client))
}
