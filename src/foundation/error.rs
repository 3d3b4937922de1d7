/// Crate-wide result alias.
pub type ReelResult<T> = Result<T, ReelError>;

/// Errors surfaced by composition jobs.
///
/// Every variant maps onto one [`ErrorCategory`]; callers show [`ReelError::status_line`] rather
/// than the raw chain.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Bad input or configuration, detected before any processing starts.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required encoder/decoder/muxer capability is missing.
    #[error("capability error: {0}")]
    Capability(String),

    /// An external transcoding invocation failed.
    #[error("stage '{stage}' failed: {message}")]
    Process {
        /// Pipeline stage that ran the failing invocation.
        stage: String,
        /// Trimmed stderr or spawn error.
        message: String,
    },

    /// The caller requested an abort and the job unwound.
    #[error("job aborted")]
    Cancelled,

    /// Another job is already encoding or muxing in this session.
    #[error("a composition job is already running")]
    Busy,

    /// Anything else (I/O, serialization) with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// User-facing error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Input rejected up front; fully recoverable.
    Validation,
    /// Missing capability that could not be worked around.
    Capability,
    /// Fatal job failure.
    Failure,
    /// Abort requested by the caller. Not a failure.
    Cancelled,
}

impl ReelError {
    /// Validation error helper.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Capability error helper.
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    /// External-process failure helper.
    pub fn process(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Internal failure helper for conditions that are neither validation nor process errors.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Other(anyhow::anyhow!(msg.into()))
    }

    /// Taxonomy bucket for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::Busy => ErrorCategory::Validation,
            Self::Capability(_) => ErrorCategory::Capability,
            Self::Process { .. } | Self::Other(_) => ErrorCategory::Failure,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Single status line for the user. Never includes a backtrace.
    pub fn status_line(&self) -> String {
        match self {
            Self::Validation(msg) => format!("invalid input: {msg}"),
            Self::Busy => "busy: a job is already running".to_string(),
            Self::Capability(msg) => format!("unsupported: {msg}"),
            Self::Process { stage, .. } => format!("failed during {stage}"),
            Self::Other(err) => format!("failed: {err}"),
            Self::Cancelled => "aborted".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
