pub mod central;
pub mod edge;
pub mod ingest;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pipeline::DispatchStats;

use crate::config::{Cli, Commands, NodeConfig};
use crate::error::NodeError;

pub use central::{CentralHandler, CentralNode};
pub use edge::EdgeNode;
pub use ingest::IngestNode;

/// Задачи запущенного stage'а: inbound source(s) и, для relay stage'ей,
/// dispatcher.
pub struct Running {
    pub name: &'static str,
    pub sources: Vec<JoinHandle<()>>,
    pub dispatcher: Option<JoinHandle<DispatchStats>>,
}

impl Running {
    /// Дождаться завершения задач после отмены токена. Всё, что не успело
    /// за `drain`, прерывается.
    pub async fn join(self, drain: Duration) -> Option<DispatchStats> {
        let deadline = tokio::time::Instant::now() + drain;

        for mut h in self.sources {
            if tokio::time::timeout_at(deadline, &mut h).await.is_err() {
                tracing::warn!(stage = self.name, "source did not stop in time, aborting");
                h.abort();
            }
        }

        let mut dispatcher = self.dispatcher?;
        match tokio::time::timeout_at(deadline, &mut dispatcher).await {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                tracing::error!(stage = self.name, error = %e, "dispatcher task failed");
                None
            }
            Err(_) => {
                tracing::warn!(stage = self.name, "dispatcher did not stop in time, aborting");
                dispatcher.abort();
                None
            }
        }
    }
}

pub async fn run(cli: Cli) -> Result<(), NodeError> {
    let config = NodeConfig::load(&cli.config)?;
    let token = CancellationToken::new();

    let running = match &cli.command {
        Commands::Ingest(args) => {
            let settings = config.ingest.clone().with_args(args)?;
            IngestNode::bind(settings, config.retry.clone()).await?.spawn(token.clone())
        }
        Commands::Edge(args) => {
            let settings = config.edge.clone().with_args(args)?;
            EdgeNode::bind(settings, config.retry.clone()).await?.spawn(token.clone())
        }
        Commands::Central(args) => {
            let settings = config.central.clone().with_args(args)?;
            CentralNode::bind(settings).await?.spawn(token.clone())
        }
    };
    tracing::info!(stage = running.name, config = %cli.config, "node ready");

    // --- Ожидание Ctrl+C ---
    tokio::signal::ctrl_c().await?;
    tracing::info!(stage = running.name, "shutting down...");

    token.cancel();

    let name = running.name;
    if let Some(stats) = running.join(config.shutdown.drain_timeout()).await {
        tracing::info!(
            stage = name,
            delivered = stats.delivered,
            dropped = stats.dropped,
            "dispatcher stats"
        );
    }

    tracing::info!(stage = name, "shutdown complete");
    Ok(())
}
