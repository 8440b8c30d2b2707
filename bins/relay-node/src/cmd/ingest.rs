use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use framing_lines::LinesFraming;
use pipeline::{RelayHandler, RetryPolicy, bind_datagram, relay_queue, spawn_datagram_source, spawn_dispatcher};
use transport_tcp_client::TcpForwarder;

use super::Running;
use crate::config::IngestConfig;
use crate::error::NodeError;

const STAGE: &str = "ingest";

/// UDP gateway: датаграмма → валидация → очередь → TCP к edge.
pub struct IngestNode {
    settings: IngestConfig,
    retry: RetryPolicy,
    peer: String,
    socket: UdpSocket,
}

impl IngestNode {
    pub async fn bind(settings: IngestConfig, retry: RetryPolicy) -> Result<Self, NodeError> {
        let peer = settings.peer.clone().ok_or(NodeError::MissingPeer(STAGE))?;
        let socket = bind_datagram(&settings.listen_addr()).await?;
        Ok(Self { settings, retry, peer, socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn spawn(self, token: CancellationToken) -> Running {
        let (tx, rx) = relay_queue(self.settings.queue_capacity, token.clone());
        let handler = Arc::new(RelayHandler::new(STAGE, tx));

        let source = spawn_datagram_source(
            STAGE.to_string(),
            self.socket,
            self.settings.max_datagram,
            handler,
            token.clone(),
        );

        tracing::info!(stage = STAGE, peer = %self.peer, capacity = self.settings.queue_capacity, "forwarding");
        let dispatcher = spawn_dispatcher(
            STAGE.to_string(),
            rx,
            Arc::new(TcpForwarder::new(self.peer)),
            Arc::new(LinesFraming::new(&self.settings.framing)),
            self.retry,
            token,
        );

        Running { name: STAGE, sources: vec![source], dispatcher: Some(dispatcher) }
    }
}
