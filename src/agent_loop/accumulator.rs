//! Tool-call accumulator: argument buffering, concurrent execution and
//! ordered emission of tool results.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::types::RunId;
use crate::delta::{MessageDelta, UpdateEnvelope};
use crate::error::{DeltaError, Result};
use crate::tools::{ToolArguments, ToolExecutionContext, ToolRegistry};
use crate::types::{
    new_message_id, AIContent, ChatMessage, Conversation, Role, ToolCallContent,
    ToolResultContent,
};

/// A tool call whose argument text has been fully received.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub call: ToolCallContent,
    /// The argument text exactly as streamed.
    pub raw_arguments: String,
}

struct InFlightCall {
    call: ToolCallContent,
    buffer: String,
    execution: Option<JoinHandle<Result<Value>>>,
}

/// Tracks the tool calls of one round trip.
///
/// Calls execute concurrently as soon as their arguments complete. Results
/// are released together by [`emit_tool_messages`](Self::emit_tool_messages),
/// in registration order.
pub struct ToolCallAccumulator {
    registry: Arc<ToolRegistry>,
    run_id: RunId,
    calls: Vec<InFlightCall>,
    pending: bool,
}

impl std::fmt::Debug for ToolCallAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallAccumulator")
            .field("run_id", &self.run_id)
            .field(
                "calls",
                &self.calls.iter().map(|c| &c.call.call_id).collect::<Vec<_>>(),
            )
            .field("pending", &self.pending)
            .finish()
    }
}

impl ToolCallAccumulator {
    pub fn new(registry: Arc<ToolRegistry>, run_id: RunId) -> Self {
        Self {
            registry,
            run_id,
            calls: Vec::new(),
            pending: false,
        }
    }

    /// Start tracking a call. Marks the round trip as having pending calls.
    pub fn register_call(
        &mut self,
        call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> ToolCallContent {
        let call = ToolCallContent::new(call_id, name);
        tracing::debug!(call_id = %call.call_id, tool = %call.name, "tool call registered");
        self.calls.push(InFlightCall {
            call: call.clone(),
            buffer: String::new(),
            execution: None,
        });
        self.pending = true;
        call
    }

    /// Buffer an argument fragment. Unknown call ids are ignored.
    pub fn append_arguments(&mut self, call_id: &str, fragment: &str) {
        if let Some(entry) = self.find_mut(call_id) {
            entry.buffer.push_str(fragment);
        }
    }

    /// Parse the buffered arguments, record the call in history and schedule
    /// its executor.
    ///
    /// The agent message recording the call gets `message_id`.
    pub fn complete_arguments(
        &mut self,
        call_id: &str,
        message_id: &str,
        history: &mut Conversation,
    ) -> Result<CompletedCall> {
        let registry = self.registry.clone();
        let run_id = self.run_id;
        let entry = self
            .find_mut(call_id)
            .ok_or_else(|| DeltaError::protocol(format!("arguments completed for unknown call {call_id}")))?;
        if entry.execution.is_some() {
            return Err(DeltaError::protocol(format!(
                "arguments for call {call_id} completed twice"
            )));
        }

        let arguments =
            ToolArguments::parse(&entry.buffer).map_err(|source| DeltaError::ArgumentParse {
                call_id: call_id.to_string(),
                source,
            })?;
        entry.call.arguments = arguments.raw().clone();
        history.push(ChatMessage::agent(
            message_id,
            vec![AIContent::ToolCall(entry.call.clone())],
            Some(run_id),
        ));

        let tool = registry.resolve(&entry.call.name)?;
        let ctx = ToolExecutionContext::for_call(&entry.call, run_id);
        tracing::debug!(call_id, tool = %entry.call.name, "scheduling tool execution");
        entry.execution = Some(tokio::spawn(async move {
            tool.execute(&arguments, &ctx).await
        }));

        Ok(CompletedCall {
            call: entry.call.clone(),
            raw_arguments: entry.buffer.clone(),
        })
    }

    /// Whether this round trip registered any tool call.
    pub fn has_pending_calls(&self) -> bool {
        self.pending
    }

    /// Wait for every scheduled execution, then append one tool message per
    /// call to history and return its Start/Set/End envelopes, in
    /// registration order.
    ///
    /// The first failed execution aborts the whole batch.
    pub async fn emit_tool_messages(
        &mut self,
        history: &mut Conversation,
    ) -> Result<Vec<UpdateEnvelope>> {
        let calls = std::mem::take(&mut self.calls);
        if let Some(incomplete) = calls.iter().find(|c| c.execution.is_none()) {
            return Err(DeltaError::protocol(format!(
                "tool call {} never received its arguments",
                incomplete.call.call_id
            )));
        }

        let (calls, executions): (Vec<_>, Vec<_>) = calls
            .into_iter()
            .filter_map(|c| c.execution.map(|handle| (c.call, handle)))
            .unzip();
        let outcomes = join_all(executions).await;

        let mut results = Vec::with_capacity(calls.len());
        for (call, outcome) in calls.iter().zip(outcomes) {
            let value = match outcome {
                Ok(Ok(value)) => value,
                Ok(Err(err)) => {
                    tracing::warn!(call_id = %call.call_id, tool = %call.name, error = %err, "tool execution failed");
                    return Err(match err {
                        DeltaError::ToolExecution { .. } => err,
                        other => DeltaError::ToolExecution {
                            tool_name: call.name.clone(),
                            message: other.to_string(),
                        },
                    });
                }
                Err(join_err) => {
                    tracing::warn!(call_id = %call.call_id, tool = %call.name, error = %join_err, "tool task did not finish");
                    return Err(DeltaError::ToolExecution {
                        tool_name: call.name.clone(),
                        message: join_err.to_string(),
                    });
                }
            };
            results.push(ToolResultContent {
                call_id: call.call_id.clone(),
                result: value,
            });
        }

        let mut envelopes = Vec::with_capacity(results.len() * 3);
        for result in results {
            let message_id = new_message_id();
            tracing::debug!(call_id = %result.call_id, message_id = %message_id, "emitting tool result");
            envelopes.extend(tool_message_envelopes(
                &message_id,
                self.run_id,
                AIContent::ToolResult(result.clone()),
            )?);
            history.push(ChatMessage::tool_result(message_id, result, Some(self.run_id)));
        }
        Ok(envelopes)
    }

    fn find_mut(&mut self, call_id: &str) -> Option<&mut InFlightCall> {
        self.calls.iter_mut().find(|c| c.call.call_id == call_id)
    }
}

/// Start/Set/End triple announcing a tool message holding `content`.
pub(crate) fn tool_message_envelopes(
    message_id: &str,
    run_id: RunId,
    content: AIContent,
) -> Result<[UpdateEnvelope; 3]> {
    Ok([
        UpdateEnvelope::message(message_id, MessageDelta::started(Role::Tool, Some(run_id))),
        UpdateEnvelope::message(message_id, MessageDelta::set_contents(vec![content])?),
        UpdateEnvelope::message(message_id, MessageDelta::completed(None)),
    ])
}
