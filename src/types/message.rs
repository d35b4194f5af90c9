//! Message and content types for conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::usage::Usage;
use crate::agent_loop::types::RunId;

/// Generate a fresh message id.
pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

/// Conversation role, used where a message kind must be named without its payload.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Agent,
    Tool,
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System(PlainMessage),
    Developer(PlainMessage),
    User(PlainMessage),
    Agent(RunMessage),
    Tool(RunMessage),
}

/// Body of a system, developer or user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlainMessage {
    pub id: String,
    pub contents: Vec<AIContent>,
}

/// Body of a message produced while a run executes (agent output, tool results).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMessage {
    pub id: String,
    pub contents: Vec<AIContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl RunMessage {
    fn new(id: impl Into<String>, contents: Vec<AIContent>, run_id: Option<RunId>) -> Self {
        Self {
            id: id.into(),
            contents,
            run_id,
            completed_at: Some(Utc::now()),
            usage: None,
        }
    }
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::System(PlainMessage {
            id: new_message_id(),
            contents: vec![AIContent::text(text)],
        })
    }

    /// Create a developer message.
    pub fn developer(text: impl Into<String>) -> Self {
        Self::Developer(PlainMessage {
            id: new_message_id(),
            contents: vec![AIContent::text(text)],
        })
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(PlainMessage {
            id: new_message_id(),
            contents: vec![AIContent::text(text)],
        })
    }

    /// Create a plain message for `role`. Agent and tool roles get an empty run body.
    pub fn with_role(role: Role, text: impl Into<String>) -> Self {
        match role {
            Role::System => Self::system(text),
            Role::Developer => Self::developer(text),
            Role::User => Self::user(text),
            Role::Agent => Self::agent(new_message_id(), vec![AIContent::text(text)], None),
            Role::Tool => Self::Tool(RunMessage::new(
                new_message_id(),
                vec![AIContent::text(text)],
                None,
            )),
        }
    }

    /// Create an agent message.
    pub fn agent(id: impl Into<String>, contents: Vec<AIContent>, run_id: Option<RunId>) -> Self {
        Self::Agent(RunMessage::new(id, contents, run_id))
    }

    /// Create a tool message wrapping one tool result.
    pub fn tool_result(
        id: impl Into<String>,
        result: ToolResultContent,
        run_id: Option<RunId>,
    ) -> Self {
        Self::Tool(RunMessage::new(id, vec![AIContent::ToolResult(result)], run_id))
    }

    pub fn id(&self) -> &str {
        match self {
            Self::System(m) | Self::Developer(m) | Self::User(m) => &m.id,
            Self::Agent(m) | Self::Tool(m) => &m.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System(_) => Role::System,
            Self::Developer(_) => Role::Developer,
            Self::User(_) => Role::User,
            Self::Agent(_) => Role::Agent,
            Self::Tool(_) => Role::Tool,
        }
    }

    pub fn contents(&self) -> &[AIContent] {
        match self {
            Self::System(m) | Self::Developer(m) | Self::User(m) => &m.contents,
            Self::Agent(m) | Self::Tool(m) => &m.contents,
        }
    }

    /// Run metadata, present for agent and tool messages only.
    pub fn run_info(&self) -> Option<&RunMessage> {
        match self {
            Self::Agent(m) | Self::Tool(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn run_info_mut(&mut self) -> Option<&mut RunMessage> {
        match self {
            Self::Agent(m) | Self::Tool(m) => Some(m),
            _ => None,
        }
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.contents()
            .iter()
            .filter_map(|part| match part {
                AIContent::Text(TextContent { text }) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract tool calls from this message.
    pub fn tool_calls(&self) -> Vec<&ToolCallContent> {
        self.contents()
            .iter()
            .filter_map(|part| match part {
                AIContent::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Extract tool results from this message.
    pub fn tool_results(&self) -> Vec<&ToolResultContent> {
        self.contents()
            .iter()
            .filter_map(|part| match part {
                AIContent::ToolResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AIContent {
    Text(TextContent),
    ToolCall(ToolCallContent),
    ToolResult(ToolResultContent),
    File(DataContent),
    Image(DataContent),
    Audio(DataContent),
    Video(DataContent),
    Refusal(RefusalContent),
    ContentFilter(ContentFilterContent),
}

impl AIContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent { text: text.into() })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextContent {
    pub text: String,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallContent {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCallContent {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: serde_json::Map::new(),
        }
    }
}

/// The outcome of a tool call, keyed by the call id it answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultContent {
    pub call_id: String,
    pub result: serde_json::Value,
}

/// Binary or referenced media (file, image, audio, video).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataContent {
    /// Base64 payload or URI.
    pub data: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefusalContent {
    pub reason: String,
}

/// Marker left when a provider filtered content out of the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentFilterContent {
    pub filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
