//! Record codec: TelemetryRecord ↔ однострочный JSON объект.

use crate::error::RelayError;
use crate::record::TelemetryRecord;

/// Сериализовать запись в одну строку JSON (без завершающего `\n`).
pub fn encode(record: &TelemetryRecord) -> Result<String, RelayError> {
    if !record.temperature.is_finite() {
        return Err(RelayError::encode(format!(
            "record {}: non-finite temperature",
            record.source_id
        )));
    }
    if let Some(loc) = record.location {
        if !loc.lat.is_finite() || !loc.lon.is_finite() {
            return Err(RelayError::encode(format!(
                "record {}: non-finite location",
                record.source_id
            )));
        }
    }
    serde_json::to_string(record).map_err(|e| RelayError::encode(format!("record {}: {e}", record.source_id)))
}

/// Разобрать одну строку JSON в запись.
///
/// Отсутствующие опциональные поля → None / 0 / "". Ошибки (битый JSON,
/// нечисловая температура, нет sourceId/timestamp) → `ErrorKind::Decode`.
pub fn decode(line: &str) -> Result<TelemetryRecord, RelayError> {
    serde_json::from_str(line.trim()).map_err(|e| RelayError::decode(format!("bad record: {e}")))
}

/// То же, что [`decode`], но из сырых байтов (датаграмма или фрейм).
pub fn decode_bytes(bytes: &[u8]) -> Result<TelemetryRecord, RelayError> {
    decode(std::str::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::record::Location;
    use proptest::prelude::*;

    const SAMPLE: &str = r#"{"sourceId":"42","timestamp":1000,"location":{"lat":-19.9202,"lon":-43.9301},"temperature":"39.8","activity":"pastando"}"#;

    #[test]
    fn decodes_reference_record() {
        let r = decode(SAMPLE).unwrap();
        assert_eq!(r.source_id, "42");
        assert_eq!(r.timestamp, 1000);
        assert_eq!(r.location, Some(Location::new(-19.9202, -43.9301)));
        assert_eq!(r.temperature, 39.8);
        assert_eq!(r.activity, "pastando");
        assert_eq!(r.fever_flag, None);
        assert_eq!(r.processed_at_ms, None);
    }

    #[test]
    fn comma_and_numeric_temperatures() {
        let r = decode(r#"{"sourceId":"a","timestamp":1,"temperature":"38,25"}"#).unwrap();
        assert_eq!(r.temperature, 38.25);
        let r = decode(r#"{"sourceId":"a","timestamp":1,"temperature":37.5}"#).unwrap();
        assert_eq!(r.temperature, 37.5);
    }

    #[test]
    fn missing_optionals_default() {
        let r = decode(r#"{"sourceId":"a","timestamp":5}"#).unwrap();
        assert_eq!(r.location, None);
        assert_eq!(r.temperature, 0.0);
        assert_eq!(r.activity, "");
        assert_eq!(r.fever_flag, None);
        assert_eq!(r.processed_at_ms, None);
    }

    #[test]
    fn partial_location_is_unknown() {
        let r = decode(r#"{"sourceId":"a","timestamp":5,"location":{"lat":1.0}}"#).unwrap();
        assert_eq!(r.location, None);
        let r = decode(r#"{"sourceId":"a","timestamp":5,"location":null}"#).unwrap();
        assert_eq!(r.location, None);
    }

    #[test]
    fn legacy_keys_are_accepted() {
        let r = decode(
            r#"{"brinco_id":"9","timestamp":1,"localizacao":{"lat":-19.92,"lon":-43.93},"temperatura":"40,10","atividade":"andando","alerta_febre":true,"processed_at_borda_ms":77}"#,
        )
        .unwrap();
        assert_eq!(r.source_id, "9");
        assert_eq!(r.temperature, 40.1);
        assert_eq!(r.activity, "andando");
        assert_eq!(r.fever_flag, Some(true));
        assert_eq!(r.processed_at_ms, Some(77));
        assert!(encode(&r).unwrap().contains("\"sourceId\":\"9\""));
    }

    #[test]
    fn numeric_source_id_is_coerced() {
        let r = decode(r#"{"sourceId":42,"timestamp":1}"#).unwrap();
        assert_eq!(r.source_id, "42");
    }

    #[test]
    fn malformed_input_is_decode_error() {
        for bad in ["{not json", "", "[]", r#"{"timestamp":1}"#, r#"{"sourceId":"a"}"#] {
            let e = decode(bad).unwrap_err();
            assert_eq!(e.kind(), ErrorKind::Decode, "input {bad:?}");
        }
    }

    #[test]
    fn non_numeric_temperature_is_decode_error() {
        let e = decode(r#"{"sourceId":"a","timestamp":1,"temperature":"hot"}"#).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Decode);
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        let e = decode_bytes(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Decode);
    }

    #[test]
    fn encode_is_single_line_and_omits_absent_fields() {
        let mut r = TelemetryRecord::new("line\nbreak", 3);
        r.activity = "a\nb".into();
        let line = encode(&r).unwrap();
        assert!(!line.contains('\n'));
        assert!(!line.contains("location"));
        assert!(!line.contains("feverFlag"));
        assert!(!line.contains("processedAtMs"));
    }

    #[test]
    fn encode_rejects_non_finite() {
        let mut r = TelemetryRecord::new("a", 1);
        r.temperature = f64::NAN;
        assert_eq!(encode(&r).unwrap_err().kind(), ErrorKind::Encode);

        let mut r = TelemetryRecord::new("a", 1);
        r.location = Some(Location::new(f64::INFINITY, 0.0));
        assert_eq!(encode(&r).unwrap_err().kind(), ErrorKind::Encode);
    }

    #[test]
    fn full_precision_floats_survive_round_trip() {
        let mut r = TelemetryRecord::new("a", 1);
        r.temperature = -986336.0944406821;
        r.location = Some(Location::new(10.938711676632721, -43.93012345678901));
        let back = decode(&encode(&r).unwrap()).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn canonical_and_legacy_key_together_is_rejected() {
        let e = decode(r#"{"sourceId":"a","timestamp":1,"temperature":38.0,"temperatura":"39,0"}"#).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Decode);
        assert!(e.to_string().contains("duplicate field"), "{e}");
    }

    fn finite() -> impl Strategy<Value = f64> {
        -1.0e6f64..1.0e6f64
    }

    prop_compose! {
        fn any_record()(
            source_id in "[a-zA-Z0-9 _-]{1,16}",
            timestamp in any::<i64>(),
            location in proptest::option::of((-90.0f64..90.0, -180.0f64..180.0)),
            temperature in finite(),
            activity in ".{0,12}",
            fever_flag in proptest::option::of(any::<bool>()),
            processed_at_ms in proptest::option::of(any::<i64>()),
        ) -> TelemetryRecord {
            TelemetryRecord {
                source_id,
                timestamp,
                location: location.map(|(lat, lon)| Location::new(lat, lon)),
                temperature,
                activity,
                fever_flag,
                processed_at_ms,
            }
        }
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(record in any_record()) {
            let line = encode(&record).unwrap();
            prop_assert_eq!(decode(&line).unwrap(), record);
        }
    }
}
