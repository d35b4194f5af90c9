//! Shared test helpers: event builders, tools and an SSE-backed provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agentdelta::delta::{OperationKind, UpdateEnvelope, UpdateLevel};
use agentdelta::error::DeltaError;
use agentdelta::provider::sse::decode_events;
use agentdelta::provider::{
    ContentPartKind, ModelProvider, OutputItemKind, ProviderEvent, ProviderEventStream,
    ProviderRequest,
};
use agentdelta::tools::{FnTool, ToolParameters};

pub fn message_item(item_id: &str) -> ProviderEvent {
    ProviderEvent::ItemAdded {
        item_id: item_id.into(),
        kind: OutputItemKind::Message,
    }
}

pub fn text_part(item_id: &str, index: usize) -> ProviderEvent {
    ProviderEvent::ContentPartAdded {
        item_id: item_id.into(),
        index,
        part: ContentPartKind::Text,
    }
}

pub fn text_delta(item_id: &str, index: usize, text: &str) -> ProviderEvent {
    ProviderEvent::TextDelta {
        item_id: item_id.into(),
        index,
        text: text.into(),
    }
}

pub fn text_done(item_id: &str, index: usize) -> ProviderEvent {
    ProviderEvent::TextDone {
        item_id: item_id.into(),
        index,
    }
}

pub fn item_done(item_id: &str) -> ProviderEvent {
    ProviderEvent::ItemDone {
        item_id: item_id.into(),
    }
}

pub fn function_call(item_id: &str, call_id: &str, name: &str) -> ProviderEvent {
    ProviderEvent::ItemAdded {
        item_id: item_id.into(),
        kind: OutputItemKind::FunctionCall {
            call_id: call_id.into(),
            name: name.into(),
        },
    }
}

pub fn args_delta(item_id: &str, text: &str) -> ProviderEvent {
    ProviderEvent::FunctionCallArgumentsDelta {
        item_id: item_id.into(),
        index: 0,
        text: text.into(),
    }
}

pub fn args_done(item_id: &str) -> ProviderEvent {
    ProviderEvent::FunctionCallArgumentsDone {
        item_id: item_id.into(),
        index: 0,
    }
}

/// A message item with one text part streamed as `fragments`.
pub fn text_turn(item_id: &str, fragments: &[&str]) -> Vec<ProviderEvent> {
    let mut events = vec![message_item(item_id), text_part(item_id, 0)];
    events.extend(fragments.iter().map(|f| text_delta(item_id, 0, f)));
    events.push(text_done(item_id, 0));
    events.push(item_done(item_id));
    events
}

/// A function-call item whose arguments arrive as `fragments`.
pub fn tool_call_turn(item_id: &str, call_id: &str, name: &str, fragments: &[&str]) -> Vec<ProviderEvent> {
    let mut events = vec![function_call(item_id, call_id, name)];
    events.extend(fragments.iter().map(|f| args_delta(item_id, f)));
    events.push(args_done(item_id));
    events.push(item_done(item_id));
    events
}

pub fn shape(envelopes: &[UpdateEnvelope]) -> Vec<(UpdateLevel, OperationKind)> {
    envelopes
        .iter()
        .map(|e| (e.level(), e.operation_kind()))
        .collect()
}

/// Tool returning a fixed value.
pub fn constant_tool(name: &str, value: serde_json::Value) -> FnTool {
    FnTool::new(name, "Returns a constant", ToolParameters::empty(), move |_args, _ctx| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

/// Tool echoing its arguments back as the result.
pub fn echo_tool(name: &str) -> FnTool {
    FnTool::new(name, "Echoes its arguments", ToolParameters::empty(), |args, _ctx| async move {
        Ok(serde_json::Value::Object(args.into_inner()))
    })
}

/// Tool that sleeps for `delay` and then records its name in `finished`.
pub fn delayed_tool(name: &str, delay: Duration, finished: Arc<Mutex<Vec<String>>>) -> FnTool {
    let label = name.to_string();
    FnTool::new(name, "Sleeps, then answers", ToolParameters::empty(), move |_args, ctx| {
        let finished = finished.clone();
        let label = label.clone();
        async move {
            tokio::time::sleep(delay).await;
            finished.lock().unwrap().push(label.clone());
            Ok(serde_json::json!({ "tool": label, "call_id": ctx.call_id }))
        }
    })
}

pub fn failing_tool(name: &str, message: &str) -> FnTool {
    let message = message.to_string();
    let tool_name = name.to_string();
    FnTool::new(name, "Always fails", ToolParameters::empty(), move |_args, _ctx| {
        let error = DeltaError::ToolExecution {
            tool_name: tool_name.clone(),
            message: message.clone(),
        };
        async move { Err(error) }
    })
}

/// Provider that serves each round trip from a raw SSE body.
pub struct SseProvider {
    bodies: Mutex<VecDeque<String>>,
}

impl SseProvider {
    pub fn new(bodies: impl IntoIterator<Item = String>) -> Self {
        Self {
            bodies: Mutex::new(bodies.into_iter().collect()),
        }
    }
}

/// Render JSON events as an SSE body terminated by `[DONE]`.
pub fn sse_body(events: &[serde_json::Value]) -> String {
    let mut body = String::from(": stream opened\n\n");
    for event in events {
        body.push_str(&format!("event: {}\ndata: {}\n\n", event["type"].as_str().unwrap_or(""), event));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[async_trait]
impl ModelProvider for SseProvider {
    fn provider_name(&self) -> &str {
        "sse"
    }

    async fn stream_events(
        &self,
        _request: &ProviderRequest,
    ) -> Result<ProviderEventStream, DeltaError> {
        let body = self
            .bodies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DeltaError::InvalidState("no SSE body left".into()))?;
        // Split into small chunks so frames straddle chunk boundaries.
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = body
            .as_bytes()
            .chunks(17)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(decode_events(futures::stream::iter(chunks)))
    }
}
