use relay_api::{RecordStage, TelemetryRecord, now_ms};
use serde::Deserialize;

/// Порог лихорадки по умолчанию, °C.
pub const DEFAULT_FEVER_THRESHOLD: f64 = 39.5;

#[derive(Debug, Clone, Deserialize)]
pub struct FeverConfig {
    /// Температура строго выше порога = лихорадка.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for FeverConfig {
    fn default() -> Self {
        Self { threshold: default_threshold() }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_FEVER_THRESHOLD
}

/// Anomaly tagger edge stage'а: выставляет `fever_flag` и `processed_at_ms`.
pub struct FeverTagger {
    threshold: f64,
}

impl FeverTagger {
    pub fn new(config: &FeverConfig) -> Self {
        Self { threshold: config.threshold }
    }

    /// Строгое сравнение: ровно порог — не лихорадка.
    pub fn is_fever(&self, temperature: f64) -> bool {
        temperature > self.threshold
    }
}

impl Default for FeverTagger {
    fn default() -> Self {
        Self::new(&FeverConfig::default())
    }
}

impl RecordStage for FeverTagger {
    fn name(&self) -> &str {
        "fever"
    }

    fn apply(&self, record: &mut TelemetryRecord) {
        let fever = self.is_fever(record.temperature);
        if fever {
            tracing::warn!(
                source_id = %record.source_id,
                temperature = record.temperature,
                "fever alert: temperature above threshold"
            );
        }
        record.fever_flag = Some(fever);
        record.processed_at_ms = Some(now_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(temperature: f64) -> TelemetryRecord {
        let mut r = TelemetryRecord::new("42", 1000);
        r.temperature = temperature;
        r
    }

    #[test]
    fn threshold_is_strict() {
        let t = FeverTagger::default();
        assert!(!t.is_fever(39.5));
        assert!(t.is_fever(39.50001));
        assert!(!t.is_fever(38.0));
    }

    #[test]
    fn apply_stamps_both_fields() {
        let before = now_ms();
        let mut r = record(39.8);
        FeverTagger::default().apply(&mut r);
        assert_eq!(r.fever_flag, Some(true));
        assert!(r.processed_at_ms.unwrap() >= before);
    }

    #[test]
    fn apply_leaves_origin_fields_untouched() {
        let mut r = record(37.0);
        r.activity = "pastando".into();
        let original = r.clone();
        FeverTagger::default().apply(&mut r);
        assert_eq!(r.fever_flag, Some(false));
        assert_eq!(r.source_id, original.source_id);
        assert_eq!(r.timestamp, original.timestamp);
        assert_eq!(r.temperature, original.temperature);
        assert_eq!(r.activity, original.activity);
    }

    #[test]
    fn custom_threshold() {
        let t = FeverTagger::new(&FeverConfig { threshold: 40.0 });
        assert!(!t.is_fever(39.8));
    }

    proptest! {
        #[test]
        fn flag_matches_strict_comparison(t in -50.0f64..60.0) {
            let mut r = record(t);
            FeverTagger::default().apply(&mut r);
            prop_assert_eq!(r.fever_flag, Some(t > 39.5));
        }
    }
}
