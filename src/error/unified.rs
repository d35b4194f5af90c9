//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Protocol,
    ArgumentParse,
    Tool,
    ToolExecution,
    Cancellation,
    Timeout,
    Configuration,
    Serialization,
    Provider,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryRun,
    CheckToolImplementation,
    CheckConfiguration,
    ReportProviderBug,
    ContactSupport,
    None,
}
