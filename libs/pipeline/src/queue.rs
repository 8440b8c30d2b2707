use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use relay_api::RelayError;

// ═══════════════════════════════════════════════════════════════
//  Bounded Relay Queue
// ═══════════════════════════════════════════════════════════════

/// Создать bounded FIFO очередь между inbound обработчиками и dispatcher'ом.
///
/// `RelaySender` клонируется для каждого inbound обработчика; `RelayReceiver`
/// один на stage — второго потребителя быть не может.
/// Оба конца наблюдают `token`: после отмены блокирующие вызовы возвращают
/// `ErrorKind::Cancelled`.
pub fn relay_queue<T>(capacity: usize, token: CancellationToken) -> (RelaySender<T>, RelayReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        RelaySender { tx, token: token.clone() },
        RelayReceiver { rx, token },
    )
}

/// Producer-конец очереди.
pub struct RelaySender<T> {
    tx: mpsc::Sender<T>,
    token: CancellationToken,
}

impl<T> Clone for RelaySender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), token: self.token.clone() }
    }
}

impl<T> RelaySender<T> {
    /// Поставить элемент в очередь. Блокирует (back-pressure) пока очередь полна;
    /// ожидающие producer'ы обслуживаются в порядке прихода.
    pub async fn enqueue(&self, item: T) -> Result<(), RelayError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RelayError::cancelled("enqueue cancelled by shutdown")),
            sent = self.tx.send(item) => sent.map_err(|_| RelayError::cancelled("relay queue closed")),
        }
    }

    /// Текущее число элементов (приблизительно, для логирования).
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer-конец очереди. Единственный на stage.
pub struct RelayReceiver<T> {
    rx: mpsc::Receiver<T>,
    token: CancellationToken,
}

impl<T> RelayReceiver<T> {
    /// Забрать следующий элемент. Блокирует пока очередь пуста.
    pub async fn dequeue(&mut self) -> Result<T, RelayError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RelayError::cancelled("dequeue cancelled by shutdown")),
            item = self.rx.recv() => item.ok_or_else(|| RelayError::cancelled("relay queue closed")),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
