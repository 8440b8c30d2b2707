/// Category of a relay error. Lets a stage decide what to do with it:
/// skip the input, retry the hop, or unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Record cannot be serialized (non-finite number, newline in a frame) — skip it.
    Encode,
    /// Malformed or partially unparseable input — skip record, keep the connection.
    Decode,
    /// Connect / write / timeout on a hop — transient, retry with backoff.
    Transport,
    /// Shutdown signal observed while blocked.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Encode => f.write_str("encode"),
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Unified error type for codec, queue, framing and transport operations.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the kind automatically so `?` works across layers.
#[derive(Clone)]
pub struct RelayError {
    kind: ErrorKind,
    message: String,
}

impl RelayError {
    /// Encode error — the record can't go on the wire, skip it.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Encode, message: msg.into() }
    }

    /// Decode error — bad input, skip record.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Decode, message: msg.into() }
    }

    /// Transport error — the hop may be retried.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Transport, message: msg.into() }
    }

    /// Cancellation — the caller must unwind without retrying.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Cancelled, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl std::fmt::Debug for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RelayError {}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Transport, message: e.to_string() } }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Decode, message: e.to_string() } }
}

impl From<std::str::Utf8Error> for RelayError {
    fn from(e: std::str::Utf8Error) -> Self { Self { kind: ErrorKind::Decode, message: e.to_string() } }
}
