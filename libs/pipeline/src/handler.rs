use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use relay_api::{RecordHandler, RecordStage, RelayError, TelemetryRecord, codec};

use crate::queue::RelaySender;

/// Handler relay stage'а (ingest, edge): прогнать запись через stages,
/// сериализовать и поставить в очередь к следующему hop'у.
pub struct RelayHandler {
    name: String,
    stages: Vec<Arc<dyn RecordStage>>,
    queue: RelaySender<String>,
}

impl RelayHandler {
    pub fn new(name: impl Into<String>, queue: RelaySender<String>) -> Self {
        Self { name: name.into(), stages: Vec::new(), queue }
    }

    pub fn with_stage(mut self, stage: Arc<dyn RecordStage>) -> Self {
        self.stages.push(stage);
        self
    }
}

impl RecordHandler for RelayHandler {
    fn handle(
        &self,
        mut record: TelemetryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + '_>> {
        Box::pin(async move {
            for stage in &self.stages {
                stage.apply(&mut record);
                tracing::trace!(stage = %self.name, step = stage.name(), source_id = %record.source_id, "stage applied");
            }
            let line = codec::encode(&record)?;
            self.queue.enqueue(line).await?;
            tracing::info!(
                stage = %self.name,
                source_id = %record.source_id,
                queued = self.queue.len(),
                "record enqueued"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::relay_queue;
    use tokio_util::sync::CancellationToken;

    struct Stamp;

    impl RecordStage for Stamp {
        fn name(&self) -> &str {
            "stamp"
        }

        fn apply(&self, record: &mut TelemetryRecord) {
            record.fever_flag = Some(true);
            record.processed_at_ms = Some(5);
        }
    }

    #[tokio::test]
    async fn stages_run_before_enqueue() {
        let (tx, mut rx) = relay_queue(4, CancellationToken::new());
        let handler = RelayHandler::new("edge", tx).with_stage(Arc::new(Stamp));

        handler.handle(TelemetryRecord::new("42", 1000)).await.unwrap();

        let line = rx.dequeue().await.unwrap();
        let queued = codec::decode(&line).unwrap();
        assert_eq!(queued.fever_flag, Some(true));
        assert_eq!(queued.processed_at_ms, Some(5));
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_cancelled() {
        let token = CancellationToken::new();
        let (tx, _rx) = relay_queue(4, token.clone());
        let handler = RelayHandler::new("ingest", tx);
        token.cancel();
        let err = handler.handle(TelemetryRecord::new("1", 1)).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
