pub mod config;
pub mod domain;
pub mod emit;
pub mod error;
