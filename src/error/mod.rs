//! Error types for agentdelta.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all engine operations.
///
/// Every variant is fatal for the round trip that raised it. Errors propagate
/// to the run driver unchanged; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum DeltaError {
    /// Unrecognized or out-of-order provider event.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Accumulated tool-call arguments are not a valid JSON object.
    #[error("Invalid arguments for tool call {call_id}: {source}")]
    ArgumentParse {
        call_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The tool exists but has no local executor (e.g. handled by the provider).
    #[error("Tool not executable: {0}")]
    ToolNotExecutable(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    /// A tool read an argument that is missing or has the wrong type.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A delta operation was built from a payload that breaks the single-field rule.
    #[error("Invalid delta: {0}")]
    InvalidDelta(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Run canceled")]
    Canceled,

    #[error("Run did not finish within {0} round trips")]
    RoundTripLimit(usize),

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl DeltaError {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::ArgumentParse { .. } => ErrorCategory::ArgumentParse,
            Self::ToolNotFound(_) | Self::ToolNotExecutable(_) => ErrorCategory::Tool,
            Self::ToolExecution { .. } | Self::InvalidArgument(_) => ErrorCategory::ToolExecution,
            Self::Canceled => ErrorCategory::Cancellation,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) | Self::InvalidDelta(_) => ErrorCategory::Serialization,
            Self::Provider { .. } => ErrorCategory::Provider,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether a caller could reasonably retry the run.
    ///
    /// Advisory only: the engine never retries by itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Timeout | ErrorCategory::Provider
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Timeout | ErrorCategory::Provider => RecoverySuggestion::RetryRun,
            ErrorCategory::Tool | ErrorCategory::ToolExecution => {
                RecoverySuggestion::CheckToolImplementation
            }
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Protocol | ErrorCategory::ArgumentParse => {
                RecoverySuggestion::ReportProviderBug
            }
            ErrorCategory::Cancellation => RecoverySuggestion::None,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DeltaError>;
