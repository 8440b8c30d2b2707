use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use stage_geofence::GeofenceConfig;

use super::error::SimError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub id: Option<String>,
    pub gateway: Option<String>,
    pub seed: Option<i64>,
    pub min_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub escape_probability: Option<f64>,
    pub count: Option<u64>,
    /// Зона, вокруг которой гуляет животное.
    pub geofence: Option<GeofenceConfig>,
}

pub fn load_config(path: &str) -> Result<Config, SimError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| SimError::Config(format!("cannot read config {path}: {e}")))?;
    parse_config(&content).map_err(|e| SimError::Config(format!("bad config {path}: {e}")))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct SimArgs {
    /// Путь к sensor-sim.toml
    #[arg(long, default_value = "sensor-sim.toml", env = "SENSOR_SIM_CONFIG")]
    pub config: String,

    /// Идентификатор сенсора (sourceId). По умолчанию — случайное число
    #[arg(long)]
    pub id: Option<String>,

    /// Адрес ingest stage'а (host:port)
    #[arg(long, env = "SENSOR_SIM_GATEWAY")]
    pub gateway: Option<String>,

    /// Seed для PRNG (0 = текущее время)
    #[arg(long)]
    pub seed: Option<i64>,

    /// Минимальная пауза между отправками, мс
    #[arg(long)]
    pub min_interval_ms: Option<u64>,

    /// Максимальная пауза между отправками (не включительно), мс
    #[arg(long)]
    pub max_interval_ms: Option<u64>,

    /// Доля позиций за пределами geofence, [0, 1]
    #[arg(long)]
    pub escape_probability: Option<f64>,

    /// Остановиться после N записей (без указания — до Ctrl+C)
    #[arg(long)]
    pub count: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: defaults < sensor-sim.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub id: Option<String>,
    pub gateway: String,
    pub seed: i64,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub escape_probability: f64,
    pub count: Option<u64>,
    pub geofence: GeofenceConfig,
}

impl Effective {
    pub fn new(args: &SimArgs) -> Result<Self, SimError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &SimArgs, cfg: Config) -> Result<Self, SimError> {
        let eff = Self {
            id: args.id.clone().or(cfg.id),
            gateway: args.gateway.clone().or(cfg.gateway).unwrap_or_else(|| "127.0.0.1:12345".into()),
            seed: args.seed.or(cfg.seed).unwrap_or(0),
            min_interval: Duration::from_millis(args.min_interval_ms.or(cfg.min_interval_ms).unwrap_or(5000)),
            max_interval: Duration::from_millis(args.max_interval_ms.or(cfg.max_interval_ms).unwrap_or(15000)),
            escape_probability: args.escape_probability.or(cfg.escape_probability).unwrap_or(0.1),
            count: args.count.or(cfg.count),
            geofence: cfg.geofence.unwrap_or_default(),
        };

        if eff.max_interval < eff.min_interval {
            return Err(SimError::Config("--max-interval-ms must not be below --min-interval-ms".into()));
        }
        if !(0.0..=1.0).contains(&eff.escape_probability) {
            return Err(SimError::Config("--escape-probability must be within [0, 1]".into()));
        }
        Ok(eff)
    }
}
