use serde::{Deserialize, Deserializer, Serialize};

// ═══════════════════════════════════════════════════════════════
//  TelemetryRecord
// ═══════════════════════════════════════════════════════════════

/// Единица данных, проходящая через pipeline: sensor → ingest → edge → central.
///
/// `source_id` и `timestamp` обязательны. `fever_flag` и `processed_at_ms`
/// появляются только после edge stage и дальше не меняются.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Идентификатор сенсора-источника.
    #[serde(alias = "brinco_id", deserialize_with = "de_source_id")]
    pub source_id: String,
    /// Unix ms, выставляется на сенсоре.
    pub timestamp: i64,
    /// Координаты; отсутствие = "неизвестное местоположение", не ошибка.
    #[serde(
        default,
        alias = "localizacao",
        deserialize_with = "de_location",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Location>,
    /// Температура, °C. На входе допускается строка с `,` или `.`.
    #[serde(default, alias = "temperatura", deserialize_with = "de_temperature")]
    pub temperature: f64,
    #[serde(default, alias = "atividade")]
    pub activity: String,
    #[serde(default, alias = "alerta_febre", skip_serializing_if = "Option::is_none")]
    pub fever_flag: Option<bool>,
    #[serde(default, alias = "processed_at_borda_ms", skip_serializing_if = "Option::is_none")]
    pub processed_at_ms: Option<i64>,
}

impl TelemetryRecord {
    pub fn new(source_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp,
            location: None,
            temperature: 0.0,
            activity: String::new(),
            fever_flag: None,
            processed_at_ms: None,
        }
    }
}

/// Пара (lat, lon) в градусах.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Lenient field parsing
// ═══════════════════════════════════════════════════════════════

/// Число с десятичной запятой или точкой: "39,8" и "39.8" эквивалентны.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn de_temperature<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(NumberOrText::Number(v)) => Ok(v),
        Some(NumberOrText::Text(s)) => parse_decimal(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("non-numeric temperature: {s:?}"))),
    }
}

fn de_source_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("sourceId must be a string, got {other}"))),
    }
}

/// Невалидный под-объект location трактуется как отсутствующий.
fn de_location<'de, D>(deserializer: D) -> Result<Option<Location>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|v| {
        let lat = coordinate(v.get("lat")?)?;
        let lon = coordinate(v.get("lon")?)?;
        Some(Location { lat, lon })
    }))
}

fn coordinate(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        serde_json::Value::String(s) => parse_decimal(s),
        _ => None,
    }
}
