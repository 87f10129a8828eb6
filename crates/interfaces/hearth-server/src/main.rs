use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use hearth_server::{open_store, router, AppServices, ServerConfig};
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long)]
    verbose: bool,
    #[arg(long, env = "HEARTH_BIND", default_value = hearth_config::DEFAULT_BIND_ADDR)]
    bind: String,
    #[arg(long, env = "HEARTH_DATA_DIR", conflicts_with = "in_memory")]
    data_dir: Option<Utf8PathBuf>,
    #[arg(long, help = "Keep records in memory only (lost on exit)")]
    in_memory: bool,
    #[arg(
        long,
        default_value_t = hearth_config::DEFAULT_COMMAND_TIMEOUT_SECS,
        help = "Per-command time limit; 0 disables it"
    )]
    command_timeout_secs: u64,
    #[arg(long, default_value_t = hearth_config::DEFAULT_VALIDATION_TTL_SECS)]
    validation_ttl_secs: u64,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            bind: cli.bind,
            data_dir: cli.data_dir,
            in_memory: cli.in_memory,
            command_timeout_secs: cli.command_timeout_secs,
            validation_ttl_secs: cli.validation_ttl_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::from(cli);
    let store = open_store(&config)?;
    let services = AppServices::new(store, &config);
    services.queue.start();

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router(services.clone()))
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            shutdown.notify_one();
            // Live views only end when the client leaves; don't wait on them forever.
            let grace = Duration::from_secs(hearth_config::SHUTDOWN_GRACE_SECS);
            match tokio::time::timeout(grace, &mut server).await {
                Ok(res) => res?,
                Err(_) => warn!("open live views dropped at shutdown"),
            }
        }
    }

    services.queue.shutdown().await;
    Ok(())
}
