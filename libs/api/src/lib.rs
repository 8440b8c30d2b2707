use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod codec;
pub mod error;
pub mod record;

pub use error::{ErrorKind, RelayError};
pub use record::{Location, TelemetryRecord};

/// Wall-clock Unix ms. Источник `processedAtMs` и меток времени сенсора.
pub fn now_ms() -> i64 {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(since_epoch.as_millis()).unwrap_or(i64::MAX)
}

// ════════════════════════════════════════════════════════════════
//  Wire Traits
// ════════════════════════════════════════════════════════════════

/// Framing — определение границ сообщений в потоке байтов.
///
/// Реализации должны быть stateless — всё состояние буферизации хранится
/// у вызывающего. Это позволяет безопасно использовать один экземпляр
/// framing для множества соединений.
pub trait Framing: Send + Sync {
    /// Извлечь один фрейм из буфера.
    /// Возвращает (frame_data, bytes_consumed) или None если фрейм неполный.
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, RelayError>;

    /// Добавить framed данные в выходной буфер.
    fn encode(&self, data: &[u8], buf: &mut Vec<u8>) -> Result<(), RelayError>;
}

/// Forwarder — исходящий транспорт к следующему hop'у.
///
/// Каждый вызов `forward` — одна попытка доставки: открыть соединение,
/// записать фрейм, flush, закрыть. Retry и таймауты — забота dispatcher'а.
pub trait Forwarder: Send + Sync {
    /// Адрес следующего hop'а (для логирования).
    fn peer(&self) -> &str;

    /// Доставить один уже framed фрейм.
    fn forward<'a>(&'a self, frame: &'a [u8])
        -> Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + 'a>>;
}

// ════════════════════════════════════════════════════════════════
//  Stage Traits
// ════════════════════════════════════════════════════════════════

/// Синхронное обогащение записи перед постановкой в очередь.
///
/// Вызывается до enqueue: после постановки в очередь запись не меняется.
pub trait RecordStage: Send + Sync {
    /// Имя stage'а (для логирования).
    fn name(&self) -> &str;

    fn apply(&self, record: &mut TelemetryRecord);
}

/// Бизнес-логика stage'а для успешно декодированной записи.
///
/// Вызывается inbound listener'ом. `ErrorKind::Cancelled` завершает
/// обработку соединения; остальные ошибки логируются и запись пропускается.
pub trait RecordHandler: Send + Sync {
    fn handle(&self, record: TelemetryRecord)
        -> Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + '_>>;
}
