use std::future::Future;
use std::pin::Pin;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use relay_api::{Forwarder, RelayError};

/// Исходящий TCP транспорт: новое соединение на каждую попытку доставки.
pub struct TcpForwarder {
    addr: String,
}

impl TcpForwarder {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Forwarder for TcpForwarder {
    fn peer(&self) -> &str {
        &self.addr
    }

    fn forward<'a>(
        &'a self,
        frame: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + 'a>> {
        Box::pin(async move {
            let mut stream = TcpStream::connect(&self.addr)
                .await
                .map_err(|e| RelayError::transport(format!("TCP connect to {}: {e}", self.addr)))?;
            stream
                .write_all(frame)
                .await
                .map_err(|e| RelayError::transport(format!("write to {}: {e}", self.addr)))?;
            stream.flush().await?;
            stream.shutdown().await?;
            tracing::debug!(addr = %self.addr, bytes = frame.len(), "tcp-client frame sent");
            Ok(())
        })
    }
}
