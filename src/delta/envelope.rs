//! Routed update envelopes.

use serde::{Deserialize, Serialize};

use super::operation::{DeltaOperation, OperationKind};
use super::payload::{ContentDelta, MessageDelta, RunDelta};
use crate::agent_loop::types::RunId;

/// Run-level update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunUpdate {
    #[serde(rename = "rid")]
    pub run_id: RunId,
    #[serde(rename = "cid")]
    pub conversation_id: String,
    #[serde(rename = "d")]
    pub delta: DeltaOperation<RunDelta>,
}

/// Message-level update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageUpdate {
    #[serde(rename = "mid")]
    pub message_id: String,
    /// Filled in by the translator before the envelope leaves the engine.
    #[serde(rename = "cid", default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(rename = "d")]
    pub delta: DeltaOperation<MessageDelta>,
}

/// Content-part-level update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIContentUpdate {
    #[serde(rename = "mid")]
    pub message_id: String,
    #[serde(rename = "idx")]
    pub content_index: usize,
    #[serde(rename = "d")]
    pub delta: DeltaOperation<ContentDelta>,
}

/// One routed delta operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum UpdateEnvelope {
    #[serde(rename = "run")]
    Run(RunUpdate),
    #[serde(rename = "msg")]
    Message(ChatMessageUpdate),
    #[serde(rename = "part")]
    Content(AIContentUpdate),
}

/// Framing level of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateLevel {
    Run,
    Message,
    Content,
}

/// Identity of a frame: Start, its Sets/Appends and its End share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameKey {
    Run(RunId),
    Message(String),
    Content(String, usize),
}

impl UpdateEnvelope {
    pub fn run(
        run_id: RunId,
        conversation_id: impl Into<String>,
        delta: DeltaOperation<RunDelta>,
    ) -> Self {
        Self::Run(RunUpdate {
            run_id,
            conversation_id: conversation_id.into(),
            delta,
        })
    }

    pub fn message(message_id: impl Into<String>, delta: DeltaOperation<MessageDelta>) -> Self {
        Self::Message(ChatMessageUpdate {
            message_id: message_id.into(),
            conversation_id: None,
            delta,
        })
    }

    pub fn content(
        message_id: impl Into<String>,
        content_index: usize,
        delta: DeltaOperation<ContentDelta>,
    ) -> Self {
        Self::Content(AIContentUpdate {
            message_id: message_id.into(),
            content_index,
            delta,
        })
    }

    /// Stamp the conversation id on message envelopes that lack one.
    pub fn with_conversation_id(mut self, conversation_id: &str) -> Self {
        if let Self::Message(update) = &mut self {
            if update.conversation_id.is_none() {
                update.conversation_id = Some(conversation_id.to_string());
            }
        }
        self
    }

    pub fn level(&self) -> UpdateLevel {
        match self {
            Self::Run(_) => UpdateLevel::Run,
            Self::Message(_) => UpdateLevel::Message,
            Self::Content(_) => UpdateLevel::Content,
        }
    }

    pub fn frame_key(&self) -> FrameKey {
        match self {
            Self::Run(update) => FrameKey::Run(update.run_id),
            Self::Message(update) => FrameKey::Message(update.message_id.clone()),
            Self::Content(update) => {
                FrameKey::Content(update.message_id.clone(), update.content_index)
            }
        }
    }

    pub fn operation_kind(&self) -> OperationKind {
        match self {
            Self::Run(update) => update.delta.kind(),
            Self::Message(update) => update.delta.kind(),
            Self::Content(update) => update.delta.kind(),
        }
    }

    /// True for a run-level End.
    pub fn is_run_end(&self) -> bool {
        matches!(self, Self::Run(update) if update.delta.kind() == OperationKind::End)
    }
}
