//! In-memory provider that replays scripted round trips.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{ModelProvider, ProviderEvent, ProviderEventStream, ProviderRequest};
use crate::error::DeltaError;

/// One step of a scripted round trip.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Event(ProviderEvent),
    /// Pause before the next step.
    Sleep(Duration),
    /// Fail the stream with a provider error.
    Fail(String),
    /// Never produce another event.
    Hang,
}

impl From<ProviderEvent> for ScriptStep {
    fn from(event: ProviderEvent) -> Self {
        Self::Event(event)
    }
}

/// Provider that plays back a queue of round trips and records every request.
///
/// ```
/// use agentdelta::provider::{OutputItemKind, ProviderEvent, ScriptedProvider};
///
/// let provider = ScriptedProvider::new().with_round_trip(vec![
///     ProviderEvent::ItemAdded { item_id: "msg_1".into(), kind: OutputItemKind::Message },
///     ProviderEvent::ItemDone { item_id: "msg_1".into() },
/// ]);
/// assert_eq!(provider.remaining(), 1);
/// ```
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    round_trips: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            round_trips: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue a round trip made only of events.
    pub fn with_round_trip(self, events: impl IntoIterator<Item = ProviderEvent>) -> Self {
        self.with_steps(events.into_iter().map(ScriptStep::Event))
    }

    /// Queue a round trip with pauses, failures or hangs.
    pub fn with_steps(self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        lock(&self.round_trips).push_back(steps.into_iter().collect());
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        lock(&self.requests).clone()
    }

    /// Round trips not yet played.
    pub fn remaining(&self) -> usize {
        lock(&self.round_trips).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn stream_events(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderEventStream, DeltaError> {
        lock(&self.requests).push(request.clone());
        let steps = lock(&self.round_trips).pop_front().ok_or_else(|| {
            DeltaError::InvalidState(format!(
                "script exhausted at round trip {}",
                request.round_trip
            ))
        })?;
        let provider = self.name.clone();

        let stream = async_stream::stream! {
            for step in steps {
                match step {
                    ScriptStep::Event(event) => yield Ok(event),
                    ScriptStep::Sleep(duration) => tokio::time::sleep(duration).await,
                    ScriptStep::Fail(message) => {
                        yield Err(DeltaError::provider(provider.clone(), message));
                        break;
                    }
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
