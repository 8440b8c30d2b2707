use std::time::Duration;

use serde::Deserialize;

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Retry Policy
// ═══════════════════════════════════════════════════════════════

/// Политика доставки dispatcher'а: ограниченное число попыток,
/// линейный backoff, таймаут на одну попытку.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Всего попыток на одну запись (включая первую).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Шаг линейного backoff'а: после n-й неудачи ждём `n × step`.
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
    /// Верхняя граница одной попытки (connect + write + flush).
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    /// Пауза после неудачной попытки с номером `failed_attempt` (с 1).
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms.saturating_mul(u64::from(failed_attempt)))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_attempts == 0 {
            return Err(PipelineError::Config {
                context: "retry",
                detail: "max_attempts must be at least 1".into(),
            });
        }
        if self.attempt_timeout_ms == 0 {
            return Err(PipelineError::Config {
                context: "retry",
                detail: "attempt_timeout_ms must be positive".into(),
            });
        }
        Ok(())
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_backoff_step_ms() -> u64 {
    2_000
}
fn default_attempt_timeout_ms() -> u64 {
    5_000
}
