//! Error types for PromptWall

/// Result type alias using PromptWall's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for PromptWall operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Query carried neither a prompt nor a response
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A rule pattern failed to compile
    #[error("rule '{rule}' failed to compile: {reason}")]
    Compile { rule: String, reason: String },

    /// A rule is structurally malformed
    #[error("invalid rule '{rule}': {reason}")]
    Validation { rule: String, reason: String },

    /// A compiled rule failed while matching
    #[error("rule '{rule}' failed during evaluation: {reason}")]
    Evaluation { rule: String, reason: String },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new compile error for the named rule
    pub fn compile(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Compile {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Create a new validation error for the named rule
    pub fn validation(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Create a new evaluation error for the named rule
    pub fn evaluation(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Name of the offending rule, for rule-level errors
    pub fn rule_name(&self) -> Option<&str> {
        match self {
            Self::Compile { rule, .. }
            | Self::Validation { rule, .. }
            | Self::Evaluation { rule, .. } => Some(rule),
            _ => None,
        }
    }

    /// Stable machine-readable kind, used as the `type` of error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Compile { .. } => "compile_error",
            Self::Validation { .. } => "validation_error",
            Self::Evaluation { .. } => "evaluation_error",
            Self::Config(_) => "configuration_error",
            Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::Compile { .. } | Self::Validation { .. }
        )
    }
}
