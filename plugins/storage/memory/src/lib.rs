use tokio::sync::RwLock;

use relay_api::TelemetryRecord;

// ═══════════════════════════════════════════════════════════════
//  VolatileStore
// ═══════════════════════════════════════════════════════════════

/// Append-only хранилище central stage'а. Только память процесса:
/// без persistence, без дедупликации, без вытеснения.
///
/// Порядок записей = порядок `append`. Конкурентные `append` из разных
/// соединений сериализуются одним lock'ом.
#[derive(Default)]
pub struct VolatileStore {
    records: RwLock<Vec<TelemetryRecord>>,
}

impl VolatileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить запись. Возвращает размер хранилища после добавления.
    pub async fn append(&self, record: TelemetryRecord) -> usize {
        let mut buf = self.records.write().await;
        buf.push(record);
        buf.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
