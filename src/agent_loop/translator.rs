//! Provider event translator: turns one round trip's provider events into
//! update envelopes and keeps the conversation history in step.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use super::accumulator::{tool_message_envelopes, ToolCallAccumulator};
use super::types::RunId;
use crate::delta::{ContentDelta, MessageDelta, RunDelta, UpdateEnvelope};
use crate::error::{DeltaError, Result};
use crate::provider::{ContentPartKind, LifecycleEvent, OutputItemKind, ProviderEvent};
use crate::tools::ToolRegistry;
use crate::types::{
    new_message_id, AIContent, ChatMessage, Conversation, RefusalContent, Role, TextContent,
    ToolCallContent, ToolResultContent, Usage,
};

/// Content index used for the single tool-call part of a function-call item.
const TOOL_CALL_INDEX: usize = 0;

/// Per-run inputs shared by every round trip's translator.
#[derive(Debug, Clone)]
pub struct TranslatorContext {
    pub run_id: RunId,
    pub conversation_id: String,
    pub registry: Arc<ToolRegistry>,
    pub native_tool_result: Value,
}

/// How a round trip ended.
#[derive(Debug, Clone, Default)]
pub struct RoundTripEnd {
    /// Tool messages followed, when the run is complete, by the Run End.
    pub envelopes: Vec<UpdateEnvelope>,
    /// Whether the Run End was emitted.
    pub run_completed: bool,
    /// Usage reported during this round trip.
    pub usage: Option<Usage>,
}

#[derive(Debug)]
enum OpenPart {
    Text(String),
    Refusal(String),
    ToolCall,
}

#[derive(Debug)]
enum ItemKind {
    Message,
    FunctionCall { call_id: String },
    NativeTool { name: String, started: bool },
}

#[derive(Debug)]
struct OpenItem {
    id: String,
    kind: ItemKind,
    parts: BTreeMap<usize, OpenPart>,
}

/// State machine for a single provider round trip.
#[derive(Debug)]
pub struct EventTranslator {
    ctx: TranslatorContext,
    round_trip: usize,
    prior_usage: Option<Usage>,
    open: Option<OpenItem>,
    ignored_items: HashSet<String>,
    /// Items whose message frame already ended, e.g. closed by a later item-added.
    closed_items: HashSet<String>,
    native_calls: HashMap<String, ToolCallContent>,
    accumulator: ToolCallAccumulator,
    usage: Option<Usage>,
    last_agent_message: Option<String>,
}

impl EventTranslator {
    /// `prior_usage` is the usage of earlier round trips of the same run.
    pub fn new(ctx: TranslatorContext, round_trip: usize, prior_usage: Option<Usage>) -> Self {
        let accumulator = ToolCallAccumulator::new(ctx.registry.clone(), ctx.run_id);
        Self {
            ctx,
            round_trip,
            prior_usage,
            open: None,
            ignored_items: HashSet::new(),
            closed_items: HashSet::new(),
            native_calls: HashMap::new(),
            accumulator,
            usage: None,
            last_agent_message: None,
        }
    }

    /// Opening envelopes. The run frame opens on the first round trip only.
    pub fn start(&self) -> Vec<UpdateEnvelope> {
        if self.round_trip == 0 {
            vec![UpdateEnvelope::run(
                self.ctx.run_id,
                self.ctx.conversation_id.clone(),
                RunDelta::started(),
            )]
        } else {
            Vec::new()
        }
    }

    /// Translate one provider event.
    pub fn handle(
        &mut self,
        event: ProviderEvent,
        history: &mut Conversation,
    ) -> Result<Vec<UpdateEnvelope>> {
        tracing::trace!(run_id = %self.ctx.run_id, event = event.name(), "provider event");
        let mut out = Vec::new();
        match event {
            ProviderEvent::ItemAdded { item_id, kind } => self.item_added(item_id, kind, &mut out)?,
            ProviderEvent::ContentPartAdded {
                item_id,
                index,
                part,
            } => {
                let item = open_message(&mut self.open, &item_id, "content_part_added")?;
                if item.parts.contains_key(&index) {
                    return Err(protocol_error(format!(
                        "content part {index} of {item_id} added twice"
                    )));
                }
                let (state, op) = match part {
                    ContentPartKind::Text => (OpenPart::Text(String::new()), ContentDelta::text_started()),
                    ContentPartKind::Refusal => {
                        (OpenPart::Refusal(String::new()), ContentDelta::refusal_started())
                    }
                };
                item.parts.insert(index, state);
                out.push(UpdateEnvelope::content(item_id, index, op));
            }
            ProviderEvent::TextDelta {
                item_id,
                index,
                text,
            } => {
                let item = open_message(&mut self.open, &item_id, "text_delta")?;
                match item.parts.get_mut(&index) {
                    Some(OpenPart::Text(buffer)) => buffer.push_str(&text),
                    _ => return Err(protocol_error(format!("text for unopened part {index} of {item_id}"))),
                }
                out.push(UpdateEnvelope::content(item_id, index, ContentDelta::append_text(&text)));
            }
            ProviderEvent::TextDone { item_id, index } => {
                let item = open_message(&mut self.open, &item_id, "text_done")?;
                let text = match item.parts.remove(&index) {
                    Some(OpenPart::Text(text)) => text,
                    _ => return Err(protocol_error(format!("text_done for unopened part {index} of {item_id}"))),
                };
                self.record_agent_content(
                    &item_id,
                    AIContent::Text(TextContent { text: text.clone() }),
                    history,
                );
                out.push(UpdateEnvelope::content(item_id, index, ContentDelta::text_completed(&text)));
            }
            ProviderEvent::RefusalDelta {
                item_id,
                index,
                text,
            } => {
                let item = open_message(&mut self.open, &item_id, "refusal_delta")?;
                match item.parts.get_mut(&index) {
                    Some(OpenPart::Refusal(buffer)) => buffer.push_str(&text),
                    _ => return Err(protocol_error(format!("refusal for unopened part {index} of {item_id}"))),
                }
                out.push(UpdateEnvelope::content(item_id, index, ContentDelta::append_refusal(&text)));
            }
            ProviderEvent::RefusalDone { item_id, index } => {
                let item = open_message(&mut self.open, &item_id, "refusal_done")?;
                let reason = match item.parts.remove(&index) {
                    Some(OpenPart::Refusal(reason)) => reason,
                    _ => return Err(protocol_error(format!("refusal_done for unopened part {index} of {item_id}"))),
                };
                self.record_agent_content(
                    &item_id,
                    AIContent::Refusal(RefusalContent {
                        reason: reason.clone(),
                    }),
                    history,
                );
                out.push(UpdateEnvelope::content(
                    item_id,
                    index,
                    ContentDelta::refusal_completed(&reason),
                ));
            }
            ProviderEvent::FunctionCallArgumentsDelta { item_id, text, .. } => {
                let call_id = self.open_call_id(&item_id, "function_call_arguments_delta")?;
                self.accumulator.append_arguments(&call_id, &text);
                out.push(UpdateEnvelope::content(
                    item_id,
                    TOOL_CALL_INDEX,
                    ContentDelta::append_arguments(&text),
                ));
            }
            ProviderEvent::FunctionCallArgumentsDone { item_id, .. } => {
                let call_id = self.open_call_id(&item_id, "function_call_arguments_done")?;
                let completed = self
                    .accumulator
                    .complete_arguments(&call_id, &item_id, history)?;
                if let Some(item) = self.open.as_mut() {
                    item.parts.remove(&TOOL_CALL_INDEX);
                }
                self.last_agent_message = Some(item_id.clone());
                out.push(UpdateEnvelope::content(
                    item_id,
                    TOOL_CALL_INDEX,
                    ContentDelta::tool_call_completed(&completed.call, &completed.raw_arguments),
                ));
            }
            ProviderEvent::ItemDone { item_id } => {
                if self.ignored_items.remove(&item_id) || self.closed_items.contains(&item_id) {
                    return Ok(out);
                }
                if !self.open.as_ref().is_some_and(|item| item.id == item_id) {
                    return Err(protocol_error(format!(
                        "item_done for {item_id}, which is not open"
                    )));
                }
                self.close_open(&mut out)?;
            }
            ProviderEvent::NativeToolStarted { item_id } => {
                self.native_started(&item_id, history, &mut out)?
            }
            ProviderEvent::NativeToolCompleted { item_id } => {
                self.native_completed(&item_id, history, &mut out)?
            }
            ProviderEvent::Lifecycle(LifecycleEvent::Completed { usage }) => {
                if let Some(usage) = usage {
                    self.usage.get_or_insert_with(Usage::default).merge(&usage);
                }
            }
            ProviderEvent::Lifecycle(_) => {}
            ProviderEvent::Unrecognized { kind } => {
                return Err(protocol_error(format!("unrecognized provider event {kind}")));
            }
        }
        Ok(self.stamp(out))
    }

    /// Close the round trip once the provider sequence is exhausted.
    ///
    /// Waits for all scheduled tool executions and emits their messages.
    /// The Run End follows only when no tool call was made.
    pub async fn finish(mut self, history: &mut Conversation) -> Result<RoundTripEnd> {
        let mut out = Vec::new();
        if self.open.is_some() {
            self.close_open(&mut out)?;
        }

        if let (Some(usage), Some(message_id)) = (&self.usage, &self.last_agent_message) {
            if let Some(info) = history
                .message_mut(message_id)
                .and_then(ChatMessage::run_info_mut)
            {
                info.usage = Some(usage.clone());
            }
        }

        out.extend(self.accumulator.emit_tool_messages(history).await?);

        let run_completed = !self.accumulator.has_pending_calls();
        if run_completed {
            let run_usage = merge_usage(self.prior_usage.clone(), self.usage.as_ref());
            out.push(UpdateEnvelope::run(
                self.ctx.run_id,
                self.ctx.conversation_id.clone(),
                RunDelta::completed(self.round_trip + 1, run_usage),
            ));
        }
        tracing::debug!(
            run_id = %self.ctx.run_id,
            round_trip = self.round_trip,
            run_completed,
            "round trip finished"
        );

        Ok(RoundTripEnd {
            envelopes: self.stamp(out),
            run_completed,
            usage: self.usage,
        })
    }

    fn item_added(
        &mut self,
        item_id: String,
        kind: OutputItemKind,
        out: &mut Vec<UpdateEnvelope>,
    ) -> Result<()> {
        if self.closed_items.contains(&item_id) {
            return Err(protocol_error(format!("item {item_id} added after it closed")));
        }
        if self.open.as_ref().is_some_and(|item| item.id != item_id) {
            self.close_open(out)?;
        } else if self.open.is_some() {
            return Err(protocol_error(format!("item {item_id} added twice")));
        }

        let kind = match kind {
            OutputItemKind::Reasoning => {
                self.ignored_items.insert(item_id);
                return Ok(());
            }
            OutputItemKind::Message => ItemKind::Message,
            OutputItemKind::FunctionCall { call_id, name } => {
                let call = self.accumulator.register_call(call_id.clone(), name);
                out.push(UpdateEnvelope::message(
                    item_id.clone(),
                    MessageDelta::started(Role::Agent, Some(self.ctx.run_id)),
                ));
                out.push(UpdateEnvelope::content(
                    item_id.clone(),
                    TOOL_CALL_INDEX,
                    ContentDelta::tool_call_started(&call),
                ));
                let mut parts = BTreeMap::new();
                parts.insert(TOOL_CALL_INDEX, OpenPart::ToolCall);
                self.open = Some(OpenItem {
                    id: item_id,
                    kind: ItemKind::FunctionCall { call_id },
                    parts,
                });
                return Ok(());
            }
            OutputItemKind::NativeTool { name } => ItemKind::NativeTool {
                name,
                started: false,
            },
        };

        out.push(UpdateEnvelope::message(
            item_id.clone(),
            MessageDelta::started(Role::Agent, Some(self.ctx.run_id)),
        ));
        self.open = Some(OpenItem {
            id: item_id,
            kind,
            parts: BTreeMap::new(),
        });
        Ok(())
    }

    fn native_started(
        &mut self,
        item_id: &str,
        history: &mut Conversation,
        out: &mut Vec<UpdateEnvelope>,
    ) -> Result<()> {
        let name = match self.open.as_mut() {
            Some(OpenItem {
                id,
                kind: ItemKind::NativeTool { name, started },
                ..
            }) if id == item_id && !*started => {
                *started = true;
                name.clone()
            }
            _ => {
                return Err(protocol_error(format!(
                    "native tool start for {item_id}, which is not an open native tool item"
                )))
            }
        };

        let call = ToolCallContent::new(item_id, name);
        tracing::debug!(call_id = %call.call_id, tool = %call.name, "provider-executed tool started");
        out.push(UpdateEnvelope::content(
            item_id,
            TOOL_CALL_INDEX,
            ContentDelta::tool_call_started(&call),
        ));
        out.push(UpdateEnvelope::content(
            item_id,
            TOOL_CALL_INDEX,
            ContentDelta::tool_call_completed(&call, "{}"),
        ));
        self.record_agent_content(item_id, AIContent::ToolCall(call.clone()), history);
        self.native_calls.insert(item_id.to_string(), call);
        Ok(())
    }

    fn native_completed(
        &mut self,
        item_id: &str,
        history: &mut Conversation,
        out: &mut Vec<UpdateEnvelope>,
    ) -> Result<()> {
        let Some(call) = self.native_calls.remove(item_id) else {
            return Err(protocol_error(format!(
                "native tool completion for {item_id} without a start"
            )));
        };
        let result = ToolResultContent {
            call_id: call.call_id,
            result: self.ctx.native_tool_result.clone(),
        };
        let message_id = new_message_id();
        out.extend(tool_message_envelopes(
            &message_id,
            self.ctx.run_id,
            AIContent::ToolResult(result.clone()),
        )?);
        history.push(ChatMessage::tool_result(message_id, result, Some(self.ctx.run_id)));
        Ok(())
    }

    /// End the open item's message frame.
    fn close_open(&mut self, out: &mut Vec<UpdateEnvelope>) -> Result<()> {
        let Some(item) = self.open.take() else {
            return Ok(());
        };
        if let Some(index) = item.parts.keys().next() {
            return Err(protocol_error(format!(
                "item {} closed with content part {index} still open",
                item.id
            )));
        }
        out.push(UpdateEnvelope::message(item.id.clone(), MessageDelta::completed(None)));
        self.closed_items.insert(item.id);
        Ok(())
    }

    fn open_call_id(&self, item_id: &str, event: &str) -> Result<String> {
        match &self.open {
            Some(OpenItem {
                id,
                kind: ItemKind::FunctionCall { call_id },
                parts,
            }) if id == item_id && parts.contains_key(&TOOL_CALL_INDEX) => Ok(call_id.clone()),
            _ => Err(protocol_error(format!(
                "{event} for {item_id}, which is not an open function call"
            ))),
        }
    }

    /// Append content to the agent message for `item_id`, creating it when
    /// the item has not produced one yet.
    fn record_agent_content(&mut self, item_id: &str, content: AIContent, history: &mut Conversation) {
        match history.last_mut() {
            Some(ChatMessage::Agent(message)) if message.id == item_id => {
                message.contents.push(content)
            }
            _ => history.push(ChatMessage::agent(
                item_id,
                vec![content],
                Some(self.ctx.run_id),
            )),
        }
        self.last_agent_message = Some(item_id.to_string());
    }

    fn stamp(&self, envelopes: Vec<UpdateEnvelope>) -> Vec<UpdateEnvelope> {
        envelopes
            .into_iter()
            .map(|envelope| envelope.with_conversation_id(&self.ctx.conversation_id))
            .collect()
    }
}

fn open_message<'a>(
    open: &'a mut Option<OpenItem>,
    item_id: &str,
    event: &str,
) -> Result<&'a mut OpenItem> {
    match open {
        Some(item) if item.id == item_id && matches!(item.kind, ItemKind::Message) => Ok(item),
        _ => Err(protocol_error(format!(
            "{event} for {item_id}, which is not the open message item"
        ))),
    }
}

fn protocol_error(message: String) -> DeltaError {
    tracing::warn!(%message, "protocol error");
    DeltaError::Protocol(message)
}

fn merge_usage(prior: Option<Usage>, current: Option<&Usage>) -> Option<Usage> {
    match (prior, current) {
        (Some(mut prior), Some(current)) => {
            prior.merge(current);
            Some(prior)
        }
        (prior, current) => prior.or_else(|| current.cloned()),
    }
}
