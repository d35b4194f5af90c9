//! Responses-style SSE bodies driven through the full engine.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use agentdelta::agent_loop::{RunDriver, RunRequest};
use agentdelta::delta::EnvelopeReplayer;
use agentdelta::error::DeltaError;
use agentdelta::tools::ToolRegistry;
use agentdelta::types::{ChatMessage, Conversation, Role};

use common::{echo_tool, sse_body, SseProvider};

fn text_response(item_id: &str, fragments: &[&str], usage: Value) -> Vec<Value> {
    let mut events = vec![
        json!({"type": "response.created", "response": {"id": "resp_1"}}),
        json!({"type": "response.in_progress"}),
        json!({"type": "response.output_item.added", "output_index": 0,
               "item": {"id": item_id, "type": "message", "role": "assistant"}}),
        json!({"type": "response.content_part.added", "item_id": item_id, "content_index": 0,
               "part": {"type": "output_text", "text": ""}}),
    ];
    for fragment in fragments {
        events.push(json!({"type": "response.output_text.delta", "item_id": item_id,
                           "content_index": 0, "delta": fragment}));
    }
    events.extend([
        json!({"type": "response.output_text.done", "item_id": item_id, "content_index": 0,
               "text": fragments.concat()}),
        json!({"type": "response.content_part.done", "item_id": item_id, "content_index": 0}),
        json!({"type": "response.output_item.done", "item": {"id": item_id, "type": "message"}}),
        json!({"type": "response.completed", "response": {"id": "resp_1", "usage": usage}}),
    ]);
    events
}

fn tool_response() -> Vec<Value> {
    vec![
        json!({"type": "response.created", "response": {"id": "resp_0"}}),
        json!({"type": "response.output_item.added", "output_index": 0,
               "item": {"id": "fc_1", "type": "function_call", "call_id": "call_1",
                        "name": "echo", "arguments": ""}}),
        json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{\"city\":"}),
        json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "\"Oslo\"}"}),
        json!({"type": "response.function_call_arguments.done", "item_id": "fc_1",
               "arguments": "{\"city\":\"Oslo\"}"}),
        json!({"type": "response.output_item.done", "item": {"id": "fc_1", "type": "function_call"}}),
        json!({"type": "response.completed", "response": {"id": "resp_0",
               "usage": {"input_tokens": 20, "output_tokens": 5, "total_tokens": 25}}}),
    ]
}

#[tokio::test]
async fn streamed_text_reaches_history_and_usage() {
    let usage = json!({
        "input_tokens": 12,
        "output_tokens": 3,
        "total_tokens": 15,
        "input_tokens_details": {"cached_tokens": 4},
        "output_tokens_details": {"reasoning_tokens": 0}
    });
    let provider = Arc::new(SseProvider::new([sse_body(&text_response(
        "msg_1",
        &["Hello", ", ", "world"],
        usage,
    ))]));
    let driver = RunDriver::new(provider);
    let mut conversation = Conversation::new().with_messages([ChatMessage::user("hi")]);

    let outcome = driver
        .run_to_completion(RunRequest::new(), &mut conversation, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome.streamed_text(), "Hello, world");
    let usage = outcome.usage.unwrap();
    assert_eq!(usage.total_tokens, 15);
    assert_eq!(usage.cached_input_tokens, Some(4));

    let replayer = EnvelopeReplayer::replay(&outcome.envelopes).unwrap();
    assert_eq!(replayer.message("msg_1").unwrap().text_at(0), Some("Hello, world"));
    assert_eq!(conversation.last().unwrap().text(), "Hello, world");
}

#[tokio::test]
async fn non_ascii_text_is_not_corrupted_by_chunking() {
    let fragments = ["Grüße aus ", "東京", " – naïve café ☕"];
    let provider = Arc::new(SseProvider::new([sse_body(&text_response(
        "msg_1",
        &fragments,
        json!({"input_tokens": 1, "output_tokens": 1, "total_tokens": 2}),
    ))]));
    let driver = RunDriver::new(provider);
    let mut conversation = Conversation::new();

    let outcome = driver
        .run_to_completion(RunRequest::new(), &mut conversation, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome.streamed_text(), fragments.concat());
    assert!(!outcome.streamed_text().contains('\u{FFFD}'));
    assert_eq!(conversation.last().unwrap().text(), fragments.concat());
}

#[tokio::test]
async fn function_call_arguments_round_trip_through_a_tool() {
    let provider = Arc::new(SseProvider::new([
        sse_body(&tool_response()),
        sse_body(&text_response(
            "msg_2",
            &["Oslo it is."],
            json!({"input_tokens": 30, "output_tokens": 4, "total_tokens": 34}),
        )),
    ]));
    let driver = RunDriver::new(provider).with_tools(ToolRegistry::new().with_tool(echo_tool("echo")));
    let mut conversation = Conversation::new().with_messages([ChatMessage::user("weather?")]);

    let outcome = driver
        .run_to_completion(RunRequest::new(), &mut conversation, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome.round_trips, 2);
    assert_eq!(outcome.usage.unwrap().total_tokens, 59);

    let tool_message = conversation.iter().find(|m| m.role() == Role::Tool).unwrap();
    assert_eq!(tool_message.tool_results()[0].result, json!({"city": "Oslo"}));
    let call = conversation
        .iter()
        .find_map(|m| m.tool_calls().first().map(|c| (*c).clone()))
        .unwrap();
    assert_eq!(call.name, "echo");
    assert_eq!(call.arguments["city"], "Oslo");
}

#[tokio::test]
async fn unknown_event_types_fail_the_run() {
    let events = vec![
        json!({"type": "response.created", "response": {"id": "resp_1"}}),
        json!({"type": "response.output_audio.delta", "delta": "AAAA"}),
    ];
    let provider = Arc::new(SseProvider::new([sse_body(&events)]));
    let driver = RunDriver::new(provider);
    let mut conversation = Conversation::new();

    let err = driver
        .run_to_completion(RunRequest::new(), &mut conversation, CancellationToken::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DeltaError::Protocol(_)));
}

#[tokio::test]
async fn provider_failure_events_surface_as_provider_errors() {
    let events = vec![
        json!({"type": "response.created", "response": {"id": "resp_1"}}),
        json!({"type": "response.failed", "response": {"error": {"message": "server overloaded"}}}),
    ];
    let provider = Arc::new(SseProvider::new([sse_body(&events)]));
    let driver = RunDriver::new(provider);

    let err = driver
        .run_to_completion(RunRequest::new(), &mut Conversation::new(), CancellationToken::new(), None)
        .await
        .unwrap_err();
    match err {
        DeltaError::Provider { provider, message } => {
            assert_eq!(provider, "responses");
            assert_eq!(message, "server overloaded");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
