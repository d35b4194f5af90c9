//! Convenience re-exports for common use.

pub use crate::agent_loop::{RunDriver, RunOutcome, RunRequest, UpdateSink};
pub use crate::config::{EngineConfig, InstructionRole};
pub use crate::delta::{DeltaOperation, EnvelopeReplayer, UpdateEnvelope};
pub use crate::error::{DeltaError, Result};
pub use crate::provider::{ModelProvider, ProviderEvent};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{AIContent, ChatMessage, Conversation, Role, Usage};
