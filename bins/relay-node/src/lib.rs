//! Узел конвейера телеметрии. Один процесс = один stage (`ingest`, `edge`,
//! `central`), выбирается подкомандой.

pub mod cmd;
pub mod config;
pub mod error;
