//! Client-side replay of envelope streams.
//!
//! [`apply_operation`] is the single generic routine a consumer needs: every
//! operation either creates, patches one field of, or finalizes a JSON object.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{Map, Value};

use super::envelope::{FrameKey, UpdateEnvelope};
use super::operation::{DeltaOperation, OperationKind};
use crate::agent_loop::types::RunId;
use crate::error::{DeltaError, Result};

/// Apply one operation to `target`.
pub fn apply_operation<T: Serialize>(target: &mut Value, op: &DeltaOperation<T>) -> Result<()> {
    match op {
        DeltaOperation::Start { value } => {
            *target = serde_json::to_value(value)?;
            if target.is_null() {
                *target = Value::Object(Map::new());
            }
        }
        DeltaOperation::Append { path, value } => {
            let slot = field_mut(target, path)?;
            match (slot, value) {
                (slot @ Value::Null, value) => *slot = value.clone(),
                (Value::String(existing), Value::String(fragment)) => existing.push_str(fragment),
                (Value::Array(items), Value::Array(more)) => items.extend(more.iter().cloned()),
                (Value::Array(items), value) => items.push(value.clone()),
                (slot, _) => {
                    return Err(DeltaError::InvalidDelta(format!(
                        "cannot append to {path}: existing value is {slot}"
                    )))
                }
            }
        }
        DeltaOperation::Set {
            path: Some(path),
            value,
        } => {
            *field_mut(target, path)? = value.clone();
        }
        DeltaOperation::Set { path: None, value } => merge(target, value)?,
        DeltaOperation::Replace {
            path,
            value,
            start,
            end,
        } => {
            let Value::String(replacement) = value else {
                return Err(DeltaError::InvalidDelta(format!(
                    "replace at {path} needs a string value"
                )));
            };
            let slot = field_mut(target, path)?;
            let existing = match slot {
                Value::String(existing) => existing.clone(),
                Value::Null => String::new(),
                other => {
                    return Err(DeltaError::InvalidDelta(format!(
                        "cannot replace within non-string {path}: {other}"
                    )))
                }
            };
            let chars: Vec<char> = existing.chars().collect();
            if start > end || *end > chars.len() {
                return Err(DeltaError::InvalidDelta(format!(
                    "replace range {start}..{end} exceeds length {} of {path}",
                    chars.len()
                )));
            }
            let mut spliced: String = chars[..*start].iter().collect();
            spliced.push_str(replacement);
            spliced.extend(&chars[*end..]);
            *slot = Value::String(spliced);
        }
        DeltaOperation::End { value } => merge(target, &serde_json::to_value(value)?)?,
    }
    Ok(())
}

fn field_mut<'a>(target: &'a mut Value, path: &str) -> Result<&'a mut Value> {
    if target.is_null() {
        *target = Value::Object(Map::new());
    }
    match target {
        Value::Object(map) => Ok(map.entry(path.to_string()).or_insert(Value::Null)),
        other => Err(DeltaError::InvalidDelta(format!(
            "cannot address {path} on non-object {other}"
        ))),
    }
}

fn merge(target: &mut Value, value: &Value) -> Result<()> {
    let Value::Object(fields) = value else {
        return Err(DeltaError::InvalidDelta(format!(
            "whole-object update must be an object, got {value}"
        )));
    };
    for (name, field) in fields {
        if !field.is_null() {
            *field_mut(target, name)? = field.clone();
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Open,
    Closed,
}

/// Checks the framing invariant over an envelope sequence.
///
/// Per frame: Start, then any number of Set/Append/Replace, then exactly one
/// End. Message frames nest inside an open run; content frames inside their
/// open message.
#[derive(Debug, Default)]
pub struct FramingValidator {
    frames: HashMap<FrameKey, FrameState>,
    open_runs: usize,
}

impl FramingValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, envelope: &UpdateEnvelope) -> Result<()> {
        let key = envelope.frame_key();
        let kind = envelope.operation_kind();
        let state = self.frames.get(&key).copied();

        if kind == OperationKind::Start {
            if state == Some(FrameState::Open) {
                return Err(DeltaError::protocol(format!("{key:?} started twice")));
            }
            match &key {
                FrameKey::Run(_) => self.open_runs += 1,
                FrameKey::Message(_) if self.open_runs == 0 => {
                    return Err(DeltaError::protocol(format!(
                        "{key:?} started outside an open run"
                    )))
                }
                FrameKey::Content(message_id, _)
                    if self.frames.get(&FrameKey::Message(message_id.clone()))
                        != Some(&FrameState::Open) =>
                {
                    return Err(DeltaError::protocol(format!(
                        "{key:?} started outside its open message"
                    )))
                }
                _ => {}
            }
            self.frames.insert(key, FrameState::Open);
            return Ok(());
        }

        if state != Some(FrameState::Open) {
            return Err(DeltaError::protocol(format!(
                "{kind} for {key:?} without an open frame"
            )));
        }
        if kind == OperationKind::End {
            if matches!(key, FrameKey::Run(_)) {
                self.open_runs -= 1;
            }
            self.frames.insert(key, FrameState::Closed);
        }
        Ok(())
    }

    /// Frames still open.
    pub fn open_frames(&self) -> Vec<FrameKey> {
        self.frames
            .iter()
            .filter(|(_, state)| **state == FrameState::Open)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Fail if any frame was never closed.
    pub fn finish(&self) -> Result<()> {
        let open = self.open_frames();
        if open.is_empty() {
            Ok(())
        } else {
            Err(DeltaError::protocol(format!("unterminated frames: {open:?}")))
        }
    }
}

/// A message rebuilt from envelopes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayedMessage {
    pub id: String,
    pub fields: Value,
    pub contents: BTreeMap<usize, Value>,
}

impl ReplayedMessage {
    /// The `text` field of the content part at `index`.
    pub fn text_at(&self, index: usize) -> Option<&str> {
        self.contents.get(&index)?.get("text")?.as_str()
    }
}

/// Rebuilds run and message state from an envelope stream, validating framing.
#[derive(Debug, Default)]
pub struct EnvelopeReplayer {
    validator: FramingValidator,
    runs: HashMap<RunId, Value>,
    messages: Vec<ReplayedMessage>,
}

impl EnvelopeReplayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay a whole sequence and check that every frame was closed.
    pub fn replay<'a>(envelopes: impl IntoIterator<Item = &'a UpdateEnvelope>) -> Result<Self> {
        let mut replayer = Self::new();
        for envelope in envelopes {
            replayer.apply(envelope)?;
        }
        replayer.validator.finish()?;
        Ok(replayer)
    }

    pub fn apply(&mut self, envelope: &UpdateEnvelope) -> Result<()> {
        self.validator.observe(envelope)?;
        match envelope {
            UpdateEnvelope::Run(update) => {
                let run = self.runs.entry(update.run_id).or_insert(Value::Null);
                apply_operation(run, &update.delta)
            }
            UpdateEnvelope::Message(update) => {
                let message = self.message_mut(&update.message_id);
                apply_operation(&mut message.fields, &update.delta)
            }
            UpdateEnvelope::Content(update) => {
                let message = self.message_mut(&update.message_id);
                let part = message
                    .contents
                    .entry(update.content_index)
                    .or_insert(Value::Null);
                apply_operation(part, &update.delta)
            }
        }
    }

    fn message_mut(&mut self, id: &str) -> &mut ReplayedMessage {
        let position = match self.messages.iter().position(|m| m.id == id) {
            Some(position) => position,
            None => {
                self.messages.push(ReplayedMessage {
                    id: id.to_string(),
                    ..Default::default()
                });
                self.messages.len() - 1
            }
        };
        &mut self.messages[position]
    }

    pub fn run(&self, run_id: &RunId) -> Option<&Value> {
        self.runs.get(run_id)
    }

    /// Messages in first-seen order.
    pub fn messages(&self) -> &[ReplayedMessage] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&ReplayedMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn validator(&self) -> &FramingValidator {
        &self.validator
    }
}
