//! Core run types for the agent loop.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delta::UpdateEnvelope;
use crate::types::Usage;

/// Unique run identifier.
pub type RunId = Uuid;

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    /// Provider round trips issued, including the final one.
    pub round_trips: usize,
    /// Every envelope, in emission order.
    pub envelopes: Vec<UpdateEnvelope>,
    /// Usage merged across round trips, when the provider reported any.
    pub usage: Option<Usage>,
}

impl RunOutcome {
    /// Concatenated text of all text appends, across every message.
    pub fn streamed_text(&self) -> String {
        use crate::delta::{DeltaOperation, OperationKind};

        self.envelopes
            .iter()
            .filter_map(|envelope| match envelope {
                UpdateEnvelope::Content(update)
                    if update.delta.kind() == OperationKind::Append
                        && update.delta.path() == Some("text") =>
                {
                    match &update.delta {
                        DeltaOperation::Append { value, .. } => value.as_str(),
                        _ => None,
                    }
                }
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_covers_only_the_emitted_states() {
        assert_eq!(serde_json::to_value(RunStatus::Completed).unwrap(), "completed");
        assert!(serde_json::from_value::<RunStatus>(serde_json::json!("failed")).is_err());
    }

    #[test]
    fn streamed_text_concatenates_appends() {
        let outcome = RunOutcome {
            run_id: Uuid::new_v4(),
            round_trips: 1,
            envelopes: vec![
                UpdateEnvelope::content("m", 0, crate::delta::ContentDelta::append_text("Hi")),
                UpdateEnvelope::content("m", 0, crate::delta::ContentDelta::append_arguments("{")),
                UpdateEnvelope::content("m", 0, crate::delta::ContentDelta::append_text(" there")),
            ],
            usage: None,
        };
        assert_eq!(outcome.streamed_text(), "Hi there");
    }
}
