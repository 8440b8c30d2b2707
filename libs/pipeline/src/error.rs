use relay_api::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("{0}")]
    Relay(#[from] RelayError),
}
