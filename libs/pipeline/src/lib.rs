pub mod config;
pub mod error;
mod handler;
mod queue;
mod sink;
mod source;

pub use config::RetryPolicy;
pub use error::PipelineError;
pub use handler::RelayHandler;
pub use queue::{RelayReceiver, RelaySender, relay_queue};
pub use sink::{DispatchStats, Delivery, deliver, spawn_dispatcher};
pub use source::{bind_datagram, bind_stream, spawn_datagram_source, spawn_stream_source};
