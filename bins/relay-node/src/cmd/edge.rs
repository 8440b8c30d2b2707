use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use framing_lines::LinesFraming;
use pipeline::{RelayHandler, RetryPolicy, bind_stream, relay_queue, spawn_dispatcher, spawn_stream_source};
use stage_fever::FeverTagger;
use transport_tcp_client::TcpForwarder;

use super::Running;
use crate::config::EdgeConfig;
use crate::error::NodeError;

const STAGE: &str = "edge";

/// Edge stage: TCP строки → fever tagger → очередь → TCP к central.
pub struct EdgeNode {
    settings: EdgeConfig,
    retry: RetryPolicy,
    peer: String,
    listener: TcpListener,
}

impl EdgeNode {
    pub async fn bind(settings: EdgeConfig, retry: RetryPolicy) -> Result<Self, NodeError> {
        let peer = settings.peer.clone().ok_or(NodeError::MissingPeer(STAGE))?;
        let listener = bind_stream(&settings.listen_addr()).await?;
        Ok(Self { settings, retry, peer, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn spawn(self, token: CancellationToken) -> Running {
        let framing = Arc::new(LinesFraming::new(&self.settings.framing));
        let (tx, rx) = relay_queue(self.settings.queue_capacity, token.clone());
        let handler = RelayHandler::new(STAGE, tx).with_stage(Arc::new(FeverTagger::new(&self.settings.fever)));

        let source = spawn_stream_source(
            STAGE.to_string(),
            self.listener,
            framing.clone(),
            Arc::new(handler),
            self.settings.workers,
            token.clone(),
        );

        tracing::info!(
            stage = STAGE,
            peer = %self.peer,
            workers = self.settings.workers,
            threshold = self.settings.fever.threshold,
            "forwarding"
        );
        let dispatcher = spawn_dispatcher(
            STAGE.to_string(),
            rx,
            Arc::new(TcpForwarder::new(self.peer)),
            framing,
            self.retry,
            token,
        );

        Running { name: STAGE, sources: vec![source], dispatcher: Some(dispatcher) }
    }
}
