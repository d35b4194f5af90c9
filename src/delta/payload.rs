//! Delta payloads for the three routing levels (run, message, content part).
//!
//! Each payload is a partial view of its object: `None` means "unchanged".
//! The associated constructors build the operations the translator emits,
//! always naming the single field that changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use super::operation::{push_field, DeltaOperation, DeltaPayload};
use crate::agent_loop::types::{RunId, RunStatus};
use crate::error::Result;
use crate::types::{AIContent, Role, ToolCallContent, Usage};

/// Run-level partial state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_trips: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl RunDelta {
    pub fn started() -> DeltaOperation<Self> {
        DeltaOperation::start(Self {
            status: Some(RunStatus::Running),
            ..Default::default()
        })
    }

    pub fn completed(round_trips: usize, usage: Option<Usage>) -> DeltaOperation<Self> {
        DeltaOperation::end(Self {
            status: Some(RunStatus::Completed),
            round_trips: Some(round_trips),
            usage,
        })
    }
}

impl DeltaPayload for RunDelta {
    fn changed_fields(&self) -> Result<Vec<(&'static str, Value)>> {
        let mut fields = Vec::new();
        push_field(&mut fields, "status", &self.status)?;
        push_field(&mut fields, "round_trips", &self.round_trips)?;
        push_field(&mut fields, "usage", &self.usage)?;
        Ok(fields)
    }
}

/// Message-level partial state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<AIContent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl MessageDelta {
    pub fn started(role: Role, run_id: Option<RunId>) -> DeltaOperation<Self> {
        DeltaOperation::start(Self {
            role: Some(role),
            run_id,
            ..Default::default()
        })
    }

    pub fn set_contents(contents: Vec<AIContent>) -> Result<DeltaOperation<Self>> {
        Ok(DeltaOperation::set_field(
            "contents",
            serde_json::to_value(contents)?,
        ))
    }

    pub fn completed(usage: Option<Usage>) -> DeltaOperation<Self> {
        DeltaOperation::end(Self {
            completed_at: Some(Utc::now()),
            usage,
            ..Default::default()
        })
    }
}

impl DeltaPayload for MessageDelta {
    fn changed_fields(&self) -> Result<Vec<(&'static str, Value)>> {
        let mut fields = Vec::new();
        push_field(&mut fields, "role", &self.role)?;
        push_field(&mut fields, "run_id", &self.run_id)?;
        push_field(&mut fields, "contents", &self.contents)?;
        push_field(&mut fields, "completed_at", &self.completed_at)?;
        push_field(&mut fields, "usage", &self.usage)?;
        Ok(fields)
    }
}

/// Kind of content part a [`ContentDelta`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentKind {
    Text,
    ToolCall,
    ToolResult,
    File,
    Image,
    Audio,
    Video,
    Refusal,
    ContentFilter,
}

impl ContentKind {
    pub fn of(content: &AIContent) -> Self {
        match content {
            AIContent::Text(_) => Self::Text,
            AIContent::ToolCall(_) => Self::ToolCall,
            AIContent::ToolResult(_) => Self::ToolResult,
            AIContent::File(_) => Self::File,
            AIContent::Image(_) => Self::Image,
            AIContent::Audio(_) => Self::Audio,
            AIContent::Video(_) => Self::Video,
            AIContent::Refusal(_) => Self::Refusal,
            AIContent::ContentFilter(_) => Self::ContentFilter,
        }
    }
}

/// Content-part-level partial state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw argument text of a tool call, as streamed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ContentDelta {
    fn of_kind(kind: ContentKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn text_started() -> DeltaOperation<Self> {
        DeltaOperation::start(Self::of_kind(ContentKind::Text))
    }

    pub fn append_text(fragment: &str) -> DeltaOperation<Self> {
        DeltaOperation::append_field("text", fragment)
    }

    pub fn text_completed(text: &str) -> DeltaOperation<Self> {
        DeltaOperation::end(Self {
            text: Some(text.to_string()),
            ..Self::of_kind(ContentKind::Text)
        })
    }

    pub fn refusal_started() -> DeltaOperation<Self> {
        DeltaOperation::start(Self::of_kind(ContentKind::Refusal))
    }

    pub fn append_refusal(fragment: &str) -> DeltaOperation<Self> {
        DeltaOperation::append_field("reason", fragment)
    }

    pub fn refusal_completed(reason: &str) -> DeltaOperation<Self> {
        DeltaOperation::end(Self {
            reason: Some(reason.to_string()),
            ..Self::of_kind(ContentKind::Refusal)
        })
    }

    pub fn tool_call_started(call: &ToolCallContent) -> DeltaOperation<Self> {
        DeltaOperation::start(Self {
            call_id: Some(call.call_id.clone()),
            name: Some(call.name.clone()),
            ..Self::of_kind(ContentKind::ToolCall)
        })
    }

    pub fn append_arguments(fragment: &str) -> DeltaOperation<Self> {
        DeltaOperation::append_field("arguments", fragment)
    }

    pub fn tool_call_completed(call: &ToolCallContent, raw_arguments: &str) -> DeltaOperation<Self> {
        DeltaOperation::end(Self {
            call_id: Some(call.call_id.clone()),
            name: Some(call.name.clone()),
            arguments: Some(raw_arguments.to_string()),
            ..Self::of_kind(ContentKind::ToolCall)
        })
    }
}

impl DeltaPayload for ContentDelta {
    fn changed_fields(&self) -> Result<Vec<(&'static str, Value)>> {
        let mut fields = Vec::new();
        push_field(&mut fields, "kind", &self.kind)?;
        push_field(&mut fields, "text", &self.text)?;
        push_field(&mut fields, "call_id", &self.call_id)?;
        push_field(&mut fields, "name", &self.name)?;
        push_field(&mut fields, "arguments", &self.arguments)?;
        push_field(&mut fields, "result", &self.result)?;
        push_field(&mut fields, "reason", &self.reason)?;
        Ok(fields)
    }
}
