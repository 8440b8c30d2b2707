#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}: peer address is not configured (use --peer or the [{0}] peer key)")]
    MissingPeer(&'static str),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
