use std::path::Path;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use framing_lines::LinesConfig;
use pipeline::RetryPolicy;
use stage_fever::FeverConfig;
use stage_geofence::GeofenceConfig;

use crate::error::NodeError;

#[derive(Parser, Debug)]
#[command(name = "relay-node", about = "Узел конвейера телеметрии: ingest → edge → central")]
pub struct Cli {
    /// Путь к TOML конфиг файлу (отсутствующий файл = значения по умолчанию)
    #[arg(long, global = true, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// UDP gateway: датаграммы сенсоров → edge
    Ingest(IngestArgs),
    /// Edge: проверка температуры → central
    Edge(EdgeArgs),
    /// Central: geofence + volatile store
    Central(CentralArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct ListenArgs {
    /// Адрес, на котором слушает stage
    #[arg(long)]
    pub host: Option<String>,
    /// Порт, на котором слушает stage
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct IngestArgs {
    #[command(flatten)]
    pub listen: ListenArgs,
    /// Адрес следующего hop'а (host:port)
    #[arg(long, env = "RELAY_PEER")]
    pub peer: Option<String>,
    #[arg(long)]
    pub queue_capacity: Option<usize>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct EdgeArgs {
    #[command(flatten)]
    pub listen: ListenArgs,
    /// Адрес следующего hop'а (host:port)
    #[arg(long, env = "RELAY_PEER")]
    pub peer: Option<String>,
    #[arg(long)]
    pub queue_capacity: Option<usize>,
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct CentralArgs {
    #[command(flatten)]
    pub listen: ListenArgs,
    #[arg(long)]
    pub workers: Option<usize>,
}

// ═══════════════════════════════════════════════════════════════
//  TOML Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
    #[serde(default)]
    pub central: CentralConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ingest_port")]
    pub port: u16,
    #[serde(default)]
    pub peer: Option<String>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Размер буфера приёма; длиннее — датаграмма обрезается и не декодируется.
    #[serde(default = "default_max_datagram")]
    pub max_datagram: usize,
    #[serde(default)]
    pub framing: LinesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_edge_port")]
    pub port: u16,
    #[serde(default)]
    pub peer: Option<String>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub framing: LinesConfig,
    #[serde(default)]
    pub fever: FeverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CentralConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_central_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub framing: LinesConfig,
    #[serde(default)]
    pub geofence: GeofenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Сколько ждать завершения задач после Ctrl+C, прежде чем abort.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_ingest_port() -> u16 {
    12345
}
fn default_edge_port() -> u16 {
    12346
}
fn default_central_port() -> u16 {
    12347
}
fn default_queue_capacity() -> usize {
    100
}
fn default_workers() -> usize {
    5
}
fn default_max_datagram() -> usize {
    4096
}
fn default_drain_timeout_ms() -> u64 {
    5000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_ingest_port(),
            peer: None,
            queue_capacity: default_queue_capacity(),
            max_datagram: default_max_datagram(),
            framing: LinesConfig::default(),
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_edge_port(),
            peer: None,
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            framing: LinesConfig::default(),
            fever: FeverConfig::default(),
        }
    }
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_central_port(),
            workers: default_workers(),
            framing: LinesConfig::default(),
            geofence: GeofenceConfig::default(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { drain_timeout_ms: default_drain_timeout_ms() }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl NodeConfig {
    /// Загрузить конфиг. Отсутствующий файл — не ошибка: используются значения
    /// по умолчанию. Файл, который не парсится, — фатальная ошибка.
    pub fn load(path: &str) -> Result<Self, NodeError> {
        if !Path::new(path).exists() {
            tracing::info!(config = %path, "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content).map_err(|e| match e {
            NodeError::Config { context, detail } => {
                NodeError::Config { context, detail: format!("'{path}': {detail}") }
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NodeError::Config { context: "parse", detail: e.to_string() })?;
        config.retry.validate()?;
        Ok(config)
    }
}

// ═══════════════════════════════════════════════════════════════
//  CLI overrides: defaults < TOML < CLI/env
// ═══════════════════════════════════════════════════════════════

impl ListenArgs {
    fn apply(&self, host: &mut String, port: &mut u16) {
        if let Some(h) = &self.host {
            host.clone_from(h);
        }
        if let Some(p) = self.port {
            *port = p;
        }
    }
}

impl IngestConfig {
    pub fn with_args(mut self, args: &IngestArgs) -> Result<Self, NodeError> {
        args.listen.apply(&mut self.host, &mut self.port);
        if args.peer.is_some() {
            self.peer.clone_from(&args.peer);
        }
        if let Some(c) = args.queue_capacity {
            self.queue_capacity = c;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        positive("ingest.queue_capacity", self.queue_capacity)?;
        positive("ingest.max_datagram", self.max_datagram)
    }
}

impl EdgeConfig {
    pub fn with_args(mut self, args: &EdgeArgs) -> Result<Self, NodeError> {
        args.listen.apply(&mut self.host, &mut self.port);
        if args.peer.is_some() {
            self.peer.clone_from(&args.peer);
        }
        if let Some(c) = args.queue_capacity {
            self.queue_capacity = c;
        }
        if let Some(w) = args.workers {
            self.workers = w;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        positive("edge.queue_capacity", self.queue_capacity)?;
        positive("edge.workers", self.workers)
    }
}

impl CentralConfig {
    pub fn with_args(mut self, args: &CentralArgs) -> Result<Self, NodeError> {
        args.listen.apply(&mut self.host, &mut self.port);
        if let Some(w) = args.workers {
            self.workers = w;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        positive("central.workers", self.workers)
    }
}

fn positive(key: &'static str, value: usize) -> Result<(), NodeError> {
    if value == 0 {
        return Err(NodeError::Config { context: "validate", detail: format!("{key} must be at least 1") });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_reference_defaults() {
        let cfg = NodeConfig::parse("").unwrap();
        assert_eq!(cfg.ingest.port, 12345);
        assert_eq!(cfg.edge.port, 12346);
        assert_eq!(cfg.central.port, 12347);
        assert_eq!(cfg.ingest.queue_capacity, 100);
        assert_eq!(cfg.edge.workers, 5);
        assert_eq!(cfg.central.workers, 5);
        assert_eq!(cfg.edge.fever.threshold, 39.5);
        assert_eq!(cfg.central.geofence.center_lat, -19.92);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.shutdown.drain_timeout(), Duration::from_secs(5));
        assert!(cfg.ingest.peer.is_none());
    }

    #[test]
    fn toml_sections_override_defaults() {
        let cfg = NodeConfig::parse(
            r#"
            [ingest]
            peer = "edge.local:12346"
            queue_capacity = 10

            [edge]
            peer = "central.local:12347"
            workers = 2

            [edge.fever]
            threshold = 40.0

            [central.geofence]
            max_lat_deviation = 0.01

            [retry]
            max_attempts = 3
            backoff_step_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(cfg.ingest.peer.as_deref(), Some("edge.local:12346"));
        assert_eq!(cfg.ingest.queue_capacity, 10);
        assert_eq!(cfg.edge.workers, 2);
        assert_eq!(cfg.edge.fever.threshold, 40.0);
        assert_eq!(cfg.central.geofence.max_lat_deviation, 0.01);
        assert_eq!(cfg.central.geofence.max_lon_deviation, 0.0008);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.attempt_timeout_ms, 5000);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = NodeConfig::parse("[ingest\nport = ").unwrap_err();
        assert!(matches!(err, NodeError::Config { context: "parse", .. }));
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(NodeConfig::parse("[gateway]\nport = 1\n").is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(NodeConfig::parse("[retry]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = NodeConfig::load("/nonexistent/relay-node/relay.toml").unwrap();
        assert_eq!(cfg.edge.port, 12346);
    }

    #[test]
    fn cli_wins_over_toml() {
        let cfg = NodeConfig::parse("[edge]\nport = 1000\npeer = \"a:1\"\nworkers = 3\n").unwrap();
        let args = EdgeArgs {
            listen: ListenArgs { host: Some("127.0.0.1".into()), port: None },
            peer: Some("b:2".into()),
            queue_capacity: None,
            workers: Some(7),
        };
        let edge = cfg.edge.with_args(&args).unwrap();
        assert_eq!(edge.listen_addr(), "127.0.0.1:1000");
        assert_eq!(edge.peer.as_deref(), Some("b:2"));
        assert_eq!(edge.workers, 7);
    }

    #[test]
    fn zero_workers_rejected() {
        let args = CentralArgs { workers: Some(0), ..Default::default() };
        assert!(CentralConfig::default().with_args(&args).is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from([
            "relay-node",
            "--config",
            "x.toml",
            "ingest",
            "--port",
            "9000",
            "--peer",
            "127.0.0.1:9001",
        ]);
        assert_eq!(cli.config, "x.toml");
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.listen.port, Some(9000));
                assert_eq!(args.peer.as_deref(), Some("127.0.0.1:9001"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
