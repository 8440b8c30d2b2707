use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use relay_api::{Forwarder, Framing};

use crate::config::RetryPolicy;
use crate::queue::RelayReceiver;

/// Итог доставки одного фрейма.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered { attempts: u32 },
    /// Все попытки исчерпаны, фрейм выброшен.
    Dropped { attempts: u32 },
    /// Shutdown во время попытки или backoff.
    Cancelled { attempts: u32 },
}

/// Счётчики dispatcher'а, возвращаются из его задачи при завершении.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// Доставить фрейм с повторами.
///
/// Каждая попытка ограничена `policy.attempt_timeout()`. После неудачной
/// попытки `n` пауза `policy.backoff(n)`; после последней паузы нет, и
/// `Dropped` возвращается сразу. С настройками по умолчанию drop наступает
/// через 20 s backoff'а, а не через 30 s, как было бы при паузе
/// `backoff(max_attempts)` перед выбросом записи.
pub async fn deliver(
    name: &str,
    forwarder: &dyn Forwarder,
    frame: &[u8],
    policy: &RetryPolicy,
    token: &CancellationToken,
) -> Delivery {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return Delivery::Cancelled { attempts: attempt - 1 },
            outcome = tokio::time::timeout(policy.attempt_timeout(), forwarder.forward(frame)) => outcome,
        };

        match outcome {
            Ok(Ok(())) => return Delivery::Delivered { attempts: attempt },
            Ok(Err(e)) => {
                tracing::warn!(
                    stage = %name,
                    peer = %forwarder.peer(),
                    attempt,
                    max_attempts,
                    error = %e,
                    "forward failed"
                );
            }
            Err(_) => {
                tracing::warn!(
                    stage = %name,
                    peer = %forwarder.peer(),
                    attempt,
                    max_attempts,
                    timeout_ms = policy.attempt_timeout_ms,
                    "forward timed out"
                );
            }
        }

        if attempt < max_attempts {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Delivery::Cancelled { attempts: attempt },
                _ = tokio::time::sleep(policy.backoff(attempt)) => {}
            }
        }
    }

    Delivery::Dropped { attempts: max_attempts }
}

/// Запустить единственного consumer'а очереди stage'а.
///
/// Строки доставляются строго по одной в порядке очереди; выброшенная строка
/// логируется один раз, и dispatcher переходит к следующей.
pub fn spawn_dispatcher(
    name: String,
    mut queue: RelayReceiver<String>,
    forwarder: Arc<dyn Forwarder>,
    framing: Arc<dyn Framing>,
    policy: RetryPolicy,
    token: CancellationToken,
) -> JoinHandle<DispatchStats> {
    tokio::spawn(async move {
        let mut stats = DispatchStats::default();
        let mut frame = Vec::with_capacity(1024);

        tracing::info!(stage = %name, peer = %forwarder.peer(), "dispatcher started");

        loop {
            let line = match queue.dequeue().await {
                Ok(line) => line,
                Err(_) => break,
            };

            frame.clear();
            if let Err(e) = framing.encode(line.as_bytes(), &mut frame) {
                tracing::error!(stage = %name, error = %e, "cannot frame record, dropping");
                stats.dropped += 1;
                continue;
            }

            match deliver(&name, &*forwarder, &frame, &policy, &token).await {
                Delivery::Delivered { attempts } => {
                    stats.delivered += 1;
                    tracing::debug!(stage = %name, attempts, "record forwarded");
                }
                Delivery::Dropped { attempts } => {
                    stats.dropped += 1;
                    tracing::error!(
                        stage = %name,
                        peer = %forwarder.peer(),
                        attempts,
                        record = %line,
                        "record dropped after exhausting retries"
                    );
                }
                Delivery::Cancelled { .. } => break,
            }
        }

        tracing::info!(
            stage = %name,
            delivered = stats.delivered,
            dropped = stats.dropped,
            "dispatcher finished"
        );
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use framing_lines::LinesFraming;
    use relay_api::RelayError;
    use tokio::time::Instant;

    use crate::queue::relay_queue;

    /// Падает первые `fail_first` попыток, затем принимает фреймы.
    /// Фреймы с "bad" отвергаются всегда.
    struct Flaky {
        fail_first: u32,
        calls: AtomicU32,
        at: Mutex<Vec<Instant>>,
        accepted: Mutex<Vec<Vec<u8>>>,
    }

    impl Flaky {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: AtomicU32::new(0),
                at: Mutex::new(Vec::new()),
                accepted: Mutex::new(Vec::new()),
            }
        }
    }

    impl Forwarder for Flaky {
        fn peer(&self) -> &str {
            "flaky"
        }

        fn forward<'a>(
            &'a self,
            frame: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + 'a>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                self.at.lock().unwrap().push(Instant::now());
                if n <= self.fail_first || frame.windows(3).any(|w| w == b"bad") {
                    return Err(RelayError::transport("connection refused"));
                }
                self.accepted.lock().unwrap().push(frame.to_vec());
                Ok(())
            })
        }
    }

    struct Hung;

    impl Forwarder for Hung {
        fn peer(&self) -> &str {
            "hung"
        }

        fn forward<'a>(
            &'a self,
            _frame: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + 'a>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn five_attempts_with_growing_backoff() {
        let fwd = Flaky::new(u32::MAX);
        let token = CancellationToken::new();
        let start = Instant::now();

        let outcome = deliver("edge", &fwd, b"x\n", &RetryPolicy::default(), &token).await;
        assert_eq!(outcome, Delivery::Dropped { attempts: 5 });

        let at = fwd.at.lock().unwrap().clone();
        assert_eq!(at.len(), 5);
        let gaps: Vec<u64> = at.windows(2).map(|w| (w[1] - w[0]).as_secs()).collect();
        assert_eq!(gaps, vec![2, 4, 6, 8]);
        assert_eq!(start.elapsed().as_secs(), 20);
        // Drop сразу после пятой попытки, без финальной паузы
        assert_eq!(Instant::now(), at[4]);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_peer_comes_back() {
        let fwd = Flaky::new(2);
        let token = CancellationToken::new();

        let outcome = deliver("edge", &fwd, b"x\n", &RetryPolicy::default(), &token).await;
        assert_eq!(outcome, Delivery::Delivered { attempts: 3 });
        assert_eq!(fwd.accepted.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_peer_times_out_each_attempt() {
        let token = CancellationToken::new();
        let start = Instant::now();

        let outcome = deliver("edge", &Hung, b"x\n", &RetryPolicy::default(), &token).await;
        assert_eq!(outcome, Delivery::Dropped { attempts: 5 });
        // 5 × 5s timeout + 2+4+6+8s backoff
        assert_eq!(start.elapsed().as_secs(), 45);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_backoff() {
        let fwd = Flaky::new(u32::MAX);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let outcome = deliver("edge", &fwd, b"x\n", &RetryPolicy::default(), &token).await;
        assert_eq!(outcome, Delivery::Cancelled { attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn dispatcher_drops_and_moves_on() {
        let token = CancellationToken::new();
        let (tx, rx) = relay_queue::<String>(10, token.clone());
        let fwd = Arc::new(Flaky::new(0));

        let handle = spawn_dispatcher(
            "edge".into(),
            rx,
            fwd.clone(),
            Arc::new(LinesFraming::default()),
            RetryPolicy::default(),
            token.clone(),
        );

        tx.enqueue("bad".to_string()).await.unwrap();
        tx.enqueue("good".to_string()).await.unwrap();

        while fwd.accepted.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        token.cancel();

        let stats = handle.await.unwrap();
        assert_eq!(stats, DispatchStats { delivered: 1, dropped: 1 });
        assert_eq!(fwd.accepted.lock().unwrap()[0], b"good\n".to_vec());
    }
}
