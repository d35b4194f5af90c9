//! Mapping of Responses-style streaming JSON events to [`ProviderEvent`]s.

use serde_json::Value;

use super::{ContentPartKind, LifecycleEvent, OutputItemKind, ProviderEvent};
use crate::error::{DeltaError, Result};
use crate::types::Usage;

/// Output item types the provider executes on its own.
const NATIVE_TOOL_ITEMS: &[&str] = &[
    "web_search_call",
    "file_search_call",
    "code_interpreter_call",
    "image_generation_call",
];

/// Translate one decoded event.
///
/// Unknown `type` values become [`ProviderEvent::Unrecognized`]; `error` and
/// `response.failed` events become [`DeltaError::Provider`].
pub fn parse_event(event: &Value) -> Result<ProviderEvent> {
    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DeltaError::protocol("event without a type"))?;

    let parsed = match event_type {
        "response.created" => ProviderEvent::Lifecycle(LifecycleEvent::Created {
            response_id: event
                .get("response")
                .and_then(|r| r.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        "response.in_progress" => ProviderEvent::Lifecycle(LifecycleEvent::InProgress),
        "response.completed" | "response.done" => {
            ProviderEvent::Lifecycle(LifecycleEvent::Completed {
                usage: event
                    .get("response")
                    .and_then(|r| r.get("usage"))
                    .and_then(map_usage),
            })
        }
        "response.output_item.added" => {
            let item = event
                .get("item")
                .ok_or_else(|| DeltaError::protocol("output_item.added without item"))?;
            ProviderEvent::ItemAdded {
                item_id: string_field(item, "id", event_type)?,
                kind: item_kind(item)?,
            }
        }
        "response.output_item.done" => {
            let item = event
                .get("item")
                .ok_or_else(|| DeltaError::protocol("output_item.done without item"))?;
            ProviderEvent::ItemDone {
                item_id: string_field(item, "id", event_type)?,
            }
        }
        "response.content_part.added" => {
            let part = match event
                .get("part")
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
            {
                Some("refusal") => ContentPartKind::Refusal,
                _ => ContentPartKind::Text,
            };
            ProviderEvent::ContentPartAdded {
                item_id: string_field(event, "item_id", event_type)?,
                index: content_index(event),
                part,
            }
        }
        "response.content_part.done" => ProviderEvent::Lifecycle(LifecycleEvent::ContentPartDone {
            item_id: string_field(event, "item_id", event_type)?,
            index: content_index(event),
        }),
        "response.output_text.delta" => ProviderEvent::TextDelta {
            item_id: string_field(event, "item_id", event_type)?,
            index: content_index(event),
            text: string_field(event, "delta", event_type)?,
        },
        "response.output_text.done" => ProviderEvent::TextDone {
            item_id: string_field(event, "item_id", event_type)?,
            index: content_index(event),
        },
        "response.output_text.annotation.added" => {
            ProviderEvent::Lifecycle(LifecycleEvent::AnnotationAdded {
                item_id: string_field(event, "item_id", event_type)?,
                index: content_index(event),
            })
        }
        "response.refusal.delta" => ProviderEvent::RefusalDelta {
            item_id: string_field(event, "item_id", event_type)?,
            index: content_index(event),
            text: string_field(event, "delta", event_type)?,
        },
        "response.refusal.done" => ProviderEvent::RefusalDone {
            item_id: string_field(event, "item_id", event_type)?,
            index: content_index(event),
        },
        "response.function_call_arguments.delta" => ProviderEvent::FunctionCallArgumentsDelta {
            item_id: string_field(event, "item_id", event_type)?,
            index: content_index(event),
            text: string_field(event, "delta", event_type)?,
        },
        "response.function_call_arguments.done" => ProviderEvent::FunctionCallArgumentsDone {
            item_id: string_field(event, "item_id", event_type)?,
            index: content_index(event),
        },
        "error" | "response.failed" => {
            let message = event
                .get("message")
                .or_else(|| {
                    event
                        .get("response")
                        .and_then(|r| r.get("error"))
                        .and_then(|e| e.get("message"))
                })
                .and_then(Value::as_str)
                .unwrap_or("provider reported a failure");
            return Err(DeltaError::provider("responses", message));
        }
        other => match native_tool_phase(other) {
            Some(phase) => {
                let item_id = string_field(event, "item_id", event_type)?;
                match phase {
                    "in_progress" => ProviderEvent::NativeToolStarted { item_id },
                    "completed" => ProviderEvent::NativeToolCompleted { item_id },
                    _ => ProviderEvent::Lifecycle(LifecycleEvent::NativeToolSearching { item_id }),
                }
            }
            None => ProviderEvent::Unrecognized {
                kind: other.to_string(),
            },
        },
    };
    Ok(parsed)
}

/// `response.web_search_call.completed` → `Some("completed")`.
fn native_tool_phase(event_type: &str) -> Option<&str> {
    let rest = event_type.strip_prefix("response.")?;
    let (item_type, phase) = rest.split_once('.')?;
    NATIVE_TOOL_ITEMS
        .contains(&item_type)
        .then_some(phase)
        .filter(|phase| !phase.contains('.'))
}

fn item_kind(item: &Value) -> Result<OutputItemKind> {
    let item_type = item
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DeltaError::protocol("output item without a type"))?;
    match item_type {
        "message" => Ok(OutputItemKind::Message),
        "reasoning" => Ok(OutputItemKind::Reasoning),
        "function_call" => Ok(OutputItemKind::FunctionCall {
            call_id: item
                .get("call_id")
                .or_else(|| item.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| DeltaError::protocol("function_call item without call_id"))?,
            name: string_field(item, "name", "function_call")?,
        }),
        native if NATIVE_TOOL_ITEMS.contains(&native) => Ok(OutputItemKind::NativeTool {
            name: native.trim_end_matches("_call").to_string(),
        }),
        other => Err(DeltaError::protocol(format!(
            "unrecognized output item type {other}"
        ))),
    }
}

fn string_field(value: &Value, key: &str, context: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DeltaError::protocol(format!("{context} is missing {key}")))
}

fn content_index(event: &Value) -> usize {
    event
        .get("content_index")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize
}

fn map_usage(usage: &Value) -> Option<Usage> {
    let count = |v: &Value, key: &str| {
        v.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };
    Some(Usage {
        input_tokens: count(usage, "input_tokens")?,
        output_tokens: count(usage, "output_tokens")?,
        total_tokens: count(usage, "total_tokens")?,
        cached_input_tokens: usage
            .get("input_tokens_details")
            .and_then(|d| count(d, "cached_tokens")),
        reasoning_tokens: usage
            .get("output_tokens_details")
            .and_then(|d| count(d, "reasoning_tokens")),
    })
}
