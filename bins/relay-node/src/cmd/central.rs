use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use framing_lines::LinesFraming;
use pipeline::{bind_stream, spawn_stream_source};
use relay_api::{RecordHandler, RelayError, TelemetryRecord};
use stage_geofence::{Geofence, GeofenceStatus};
use storage_memory::VolatileStore;

use super::Running;
use crate::config::CentralConfig;
use crate::error::NodeError;

const STAGE: &str = "central";

/// Терминальный stage: geofence → volatile store. Исходящего hop'а нет.
pub struct CentralNode {
    settings: CentralConfig,
    listener: TcpListener,
    store: Arc<VolatileStore>,
}

impl CentralNode {
    pub async fn bind(settings: CentralConfig) -> Result<Self, NodeError> {
        let listener = bind_stream(&settings.listen_addr()).await?;
        Ok(Self { settings, listener, store: Arc::new(VolatileStore::new()) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> Arc<VolatileStore> {
        self.store.clone()
    }

    pub fn spawn(self, token: CancellationToken) -> Running {
        let handler = CentralHandler::new(Geofence::new(self.settings.geofence.clone()), self.store);

        let source = spawn_stream_source(
            STAGE.to_string(),
            self.listener,
            Arc::new(LinesFraming::new(&self.settings.framing)),
            Arc::new(handler),
            self.settings.workers,
            token,
        );

        Running { name: STAGE, sources: vec![source], dispatcher: None }
    }
}

/// Geofence носит рекомендательный характер: запись сохраняется при любом
/// результате проверки.
pub struct CentralHandler {
    geofence: Geofence,
    store: Arc<VolatileStore>,
}

impl CentralHandler {
    pub fn new(geofence: Geofence, store: Arc<VolatileStore>) -> Self {
        Self { geofence, store }
    }

    fn inspect(&self, record: &TelemetryRecord) -> GeofenceStatus {
        let status = self.geofence.evaluate(record.location.as_ref());
        match (status, &record.location) {
            (GeofenceStatus::Outside, Some(loc)) => tracing::warn!(
                stage = STAGE,
                source_id = %record.source_id,
                lat = %format!("{:.6}", loc.lat),
                lon = %format!("{:.6}", loc.lon),
                "geofence breach"
            ),
            (GeofenceStatus::Unknown, _) => {
                tracing::info!(stage = STAGE, source_id = %record.source_id, "location unknown, geofence skipped")
            }
            _ => tracing::debug!(stage = STAGE, source_id = %record.source_id, "inside geofence"),
        }

        if record.fever_flag == Some(true) {
            tracing::warn!(
                stage = STAGE,
                source_id = %record.source_id,
                temperature = record.temperature,
                "fever confirmed"
            );
        }
        status
    }
}

impl RecordHandler for CentralHandler {
    fn handle(
        &self,
        record: TelemetryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + '_>> {
        Box::pin(async move {
            let status = self.inspect(&record);
            let source_id = record.source_id.clone();
            let size = self.store.append(record).await;
            tracing::info!(stage = STAGE, %source_id, geofence = %status, store_size = size, "record stored");
            Ok(())
        })
    }
}
