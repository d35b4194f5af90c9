//! Run driver: the multi-round-trip loop around the event translator.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::instructions::InstructionScope;
use super::translator::{EventTranslator, TranslatorContext};
use super::types::{RunId, RunOutcome};
use crate::config::EngineConfig;
use crate::delta::{DeltaOperation, UpdateEnvelope};
use crate::error::{DeltaError, Result};
use crate::provider::{ModelProvider, ProviderEvent, ProviderEventStream, ProviderRequest};
use crate::tools::ToolRegistry;
use crate::types::{Conversation, Usage};
use crate::util::timeout::with_optional_timeout;

/// Callback receiving every envelope as it is emitted.
pub type UpdateSink = Arc<dyn Fn(&UpdateEnvelope) + Send + Sync>;

/// Request payload to start a run.
#[derive(Debug, Clone, Builder)]
pub struct RunRequest {
    #[builder(default = Uuid::new_v4())]
    pub run_id: RunId,
    /// Standing agent instructions, prepended for the duration of the run.
    #[builder(default)]
    pub instructions: Vec<String>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.instructions = instructions.into_iter().map(Into::into).collect();
        self
    }
}

/// Drives one run: issues round trips until the translator emits the Run End.
pub struct RunDriver {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
}

impl std::fmt::Debug for RunDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunDriver")
            .field("provider", &self.provider.provider_name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish()
    }
}

impl RunDriver {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            tools: Arc::new(ToolRegistry::new()),
            config: EngineConfig::default(),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Stream the envelopes of one run.
    ///
    /// History gains every agent and tool message the run produces. Standing
    /// instructions are present only while the stream is alive. Cancelling
    /// `cancel` ends the stream with [`DeltaError::Canceled`]; tool executions
    /// already scheduled keep running in the background. An invalid
    /// [`EngineConfig`] fails the stream before any request is sent.
    pub fn run<'a>(
        &'a self,
        request: RunRequest,
        conversation: &'a mut Conversation,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<UpdateEnvelope>> {
        let stream = async_stream::try_stream! {
            self.config.check()?;
            let run_id = request.run_id;
            let mut history = InstructionScope::enter(
                conversation,
                &request.instructions,
                self.config.instruction_role,
            );
            let ctx = TranslatorContext {
                run_id,
                conversation_id: history.id().to_string(),
                registry: self.tools.clone(),
                native_tool_result: self.config.native_tool_result.clone(),
            };
            let tools = self.tools.definitions();
            let idle = self.config.stream_idle_timeout();
            let mut usage: Option<Usage> = None;
            let mut completed = false;

            tracing::debug!(
                run_id = %run_id,
                provider = self.provider.provider_name(),
                instructions = history.inserted(),
                "run start"
            );

            for round_trip in 0..self.config.max_round_trips {
                let provider_request = ProviderRequest {
                    conversation_id: ctx.conversation_id.clone(),
                    messages: history.messages().to_vec(),
                    tools: tools.clone(),
                    round_trip,
                };
                tracing::debug!(
                    run_id = %run_id,
                    round_trip,
                    messages = provider_request.messages.len(),
                    "round trip start"
                );

                let mut events = cancellable(
                    &cancel,
                    with_optional_timeout(idle, self.provider.stream_events(&provider_request)),
                )
                .await?;

                let mut translator = EventTranslator::new(ctx.clone(), round_trip, usage.clone());
                for envelope in translator.start() {
                    yield envelope;
                }
                while let Some(event) = next_event(&mut events, idle, &cancel).await? {
                    for envelope in translator.handle(event, &mut history)? {
                        yield envelope;
                    }
                }
                drop(events);

                let end = cancellable(&cancel, translator.finish(&mut history)).await?;
                if let Some(round_trip_usage) = &end.usage {
                    usage.get_or_insert_with(Usage::default).merge(round_trip_usage);
                }
                for envelope in end.envelopes {
                    yield envelope;
                }
                if end.run_completed {
                    tracing::debug!(run_id = %run_id, round_trips = round_trip + 1, "run completed");
                    completed = true;
                    break;
                }
            }

            if !completed {
                Err::<(), _>(DeltaError::RoundTripLimit(self.config.max_round_trips))?;
            }
        };
        Box::pin(stream)
    }

    /// Drive a run to its end, forwarding each envelope to `sink`.
    pub async fn run_to_completion(
        &self,
        request: RunRequest,
        conversation: &mut Conversation,
        cancel: CancellationToken,
        sink: Option<UpdateSink>,
    ) -> Result<RunOutcome> {
        let run_id = request.run_id;
        let mut envelopes = Vec::new();
        let mut round_trips = 0;
        let mut usage = None;

        let mut stream = self.run(request, conversation, cancel);
        while let Some(envelope) = stream.next().await {
            let envelope = match envelope {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!(run_id = %run_id, error = %err, "run failed");
                    return Err(err);
                }
            };
            if let UpdateEnvelope::Run(update) = &envelope {
                if let DeltaOperation::End { value } = &update.delta {
                    round_trips = value.round_trips.unwrap_or_default();
                    usage = value.usage.clone();
                }
            }
            if let Some(sink) = &sink {
                sink(&envelope);
            }
            envelopes.push(envelope);
        }

        Ok(RunOutcome {
            run_id,
            round_trips,
            envelopes,
            usage,
        })
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DeltaError::Canceled),
        result = future => result,
    }
}

async fn next_event(
    events: &mut ProviderEventStream,
    idle: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<Option<ProviderEvent>> {
    cancellable(
        cancel,
        with_optional_timeout(idle, async { events.next().await.transpose() }),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ContentPartKind, OutputItemKind, ScriptedProvider};

    fn hello() -> Vec<ProviderEvent> {
        vec![
            ProviderEvent::ItemAdded {
                item_id: "A".into(),
                kind: OutputItemKind::Message,
            },
            ProviderEvent::ContentPartAdded {
                item_id: "A".into(),
                index: 0,
                part: ContentPartKind::Text,
            },
            ProviderEvent::TextDelta {
                item_id: "A".into(),
                index: 0,
                text: "hello".into(),
            },
            ProviderEvent::TextDone {
                item_id: "A".into(),
                index: 0,
            },
            ProviderEvent::ItemDone {
                item_id: "A".into(),
            },
        ]
    }

    #[tokio::test]
    async fn request_builder_defaults() {
        let request = RunRequest::builder().instructions(vec!["x".into()]).build();
        assert_eq!(request.instructions, vec!["x".to_string()]);
        assert_ne!(request.run_id, RunRequest::new().run_id);
    }

    #[tokio::test]
    async fn single_round_trip_run() {
        let provider = Arc::new(ScriptedProvider::new().with_round_trip(hello()));
        let driver = RunDriver::new(provider.clone());
        let mut conversation = Conversation::new();
        let outcome = driver
            .run_to_completion(
                RunRequest::new(),
                &mut conversation,
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.round_trips, 1);
        assert_eq!(outcome.streamed_text(), "hello");
        assert_eq!(conversation.len(), 1);
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn canceled_before_start() {
        let provider = Arc::new(ScriptedProvider::new().with_round_trip(hello()));
        let driver = RunDriver::new(provider);
        let mut conversation = Conversation::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = driver
            .run_to_completion(RunRequest::new(), &mut conversation, cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeltaError::Canceled));
        assert!(conversation.is_empty());
    }
}
