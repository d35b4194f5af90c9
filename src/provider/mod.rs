//! Provider seam: the event sequence one inference call produces.
//!
//! Transports implement [`ModelProvider`]. They serialize the request into
//! their wire shape and hand back a stream of [`ProviderEvent`]s; everything
//! after that is the translator's job.

pub mod scripted;

#[cfg(feature = "responses")]
pub mod responses;
#[cfg(feature = "responses")]
pub mod sse;

pub use scripted::ScriptedProvider;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::DeltaError;
use crate::types::{ChatMessage, Usage};

/// A request sent to a model provider for one round trip.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    /// Zero-based round-trip index within the run.
    pub round_trip: usize,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    /// Executed by the provider rather than locally.
    #[serde(default)]
    pub native: bool,
}

/// What an output item holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputItemKind {
    Message,
    FunctionCall { call_id: String, name: String },
    /// A tool the provider runs itself (e.g. `web_search`).
    NativeTool { name: String },
    Reasoning,
}

/// Kind of a content part inside a message item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPartKind {
    #[default]
    Text,
    Refusal,
}

/// Events with no effect on the update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "lifecycle", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Created {
        #[serde(default)]
        response_id: Option<String>,
    },
    InProgress,
    /// Final provider event; carries usage when the provider reports it.
    Completed {
        #[serde(default)]
        usage: Option<Usage>,
    },
    ContentPartDone { item_id: String, index: usize },
    AnnotationAdded { item_id: String, index: usize },
    NativeToolSearching { item_id: String },
}

/// One event of the provider's streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    ItemAdded {
        item_id: String,
        #[serde(flatten)]
        kind: OutputItemKind,
    },
    ContentPartAdded {
        item_id: String,
        index: usize,
        #[serde(default)]
        part: ContentPartKind,
    },
    TextDelta {
        item_id: String,
        index: usize,
        text: String,
    },
    TextDone {
        item_id: String,
        index: usize,
    },
    RefusalDelta {
        item_id: String,
        index: usize,
        text: String,
    },
    RefusalDone {
        item_id: String,
        index: usize,
    },
    FunctionCallArgumentsDelta {
        item_id: String,
        index: usize,
        text: String,
    },
    FunctionCallArgumentsDone {
        item_id: String,
        index: usize,
    },
    ItemDone {
        item_id: String,
    },
    NativeToolStarted {
        item_id: String,
    },
    NativeToolCompleted {
        item_id: String,
    },
    Lifecycle(LifecycleEvent),
    /// An event kind this engine does not know. Always a protocol error.
    Unrecognized {
        kind: String,
    },
}

impl ProviderEvent {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &str {
        match self {
            Self::ItemAdded { .. } => "item_added",
            Self::ContentPartAdded { .. } => "content_part_added",
            Self::TextDelta { .. } => "text_delta",
            Self::TextDone { .. } => "text_done",
            Self::RefusalDelta { .. } => "refusal_delta",
            Self::RefusalDone { .. } => "refusal_done",
            Self::FunctionCallArgumentsDelta { .. } => "function_call_arguments_delta",
            Self::FunctionCallArgumentsDone { .. } => "function_call_arguments_done",
            Self::ItemDone { .. } => "item_done",
            Self::NativeToolStarted { .. } => "native_tool_started",
            Self::NativeToolCompleted { .. } => "native_tool_completed",
            Self::Lifecycle(_) => "lifecycle",
            Self::Unrecognized { kind } => kind,
        }
    }
}

/// Stream of provider events for one round trip.
pub type ProviderEventStream = BoxStream<'static, Result<ProviderEvent, DeltaError>>;

/// Core trait implemented by provider transports.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &str;

    /// Issue one call and stream its events.
    async fn stream_events(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderEventStream, DeltaError>;
}
