//! The orchestration loop: reason, act, repeat until a final answer.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wayfarer_core::message::{ActionCall, Conversation, Message};
use wayfarer_core::provider::Provider;
use wayfarer_core::tool::ToolRegistry;

use crate::dispatch::ActionDispatcher;
use crate::emitter::{ProgressEmitter, ProgressStream};
use crate::error::RunError;
use crate::reasoning::ReasoningStep;
use crate::settings::LoopSettings;
use crate::stream_event::{ProgressEvent, StepKind};

/// Where the loop is. `Done` and `Failed` are terminal.
#[derive(Debug)]
pub enum LoopState {
    Reasoning,
    Acting(Vec<ActionCall>),
    Done(String),
    Failed(RunError),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The final answer
    pub text: String,

    /// Distinct tool names in order of first use
    pub used_tools: Vec<String>,

    /// Completed acting phases
    pub round_trips: u32,

    pub conversation: Conversation,
}

/// Drives one request at a time per call; cheap to clone and share.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    settings: Arc<LoopSettings>,
    reasoning: ReasoningStep,
    dispatcher: ActionDispatcher,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, settings: LoopSettings) -> Self {
        let reasoning = ReasoningStep::new(Arc::clone(&provider), Arc::clone(&tools), &settings);
        let dispatcher = ActionDispatcher::new(Arc::clone(&tools), &settings);
        Self {
            provider,
            tools,
            settings: Arc::new(settings),
            reasoning,
            dispatcher,
        }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Buffered mode: run to completion and return the report.
    pub async fn run(
        &self,
        text: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let emitter = ProgressEmitter::detached();
        self.drive(Conversation::new(text), &emitter, cancel).await
    }

    /// Incremental mode: spawn the loop and return its progress stream.
    ///
    /// Dropping the stream before the terminal event cancels the run.
    pub fn run_stream(&self, text: impl Into<String>, cancel: &CancellationToken) -> ProgressStream {
        let token = cancel.child_token();
        let (emitter, stream) = ProgressEmitter::channel(self.settings.event_buffer);
        let stream = stream.with_cancel_on_drop(token.clone());

        let this = self.clone();
        let conversation = Conversation::new(text);
        tokio::spawn(async move {
            // the outcome reaches the subscriber as the terminal event
            let _ = this.drive(conversation, &emitter, &token).await;
        });

        stream
    }

    /// Shared driver: enforce the request deadline and emit the terminal event.
    async fn drive(
        &self,
        conversation: Conversation,
        emitter: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let token = cancel.child_token();
        let conversation_id = conversation.id.clone();
        let deadline = self.settings.request_timeout;

        let watchdog = async {
            tokio::time::sleep(deadline).await;
            warn!(
                conversation_id = %conversation_id,
                timeout_secs = deadline.as_secs(),
                "Request deadline elapsed, cancelling run"
            );
            token.cancel();
            std::future::pending::<Result<RunReport, RunError>>().await
        };

        let outcome = tokio::select! {
            outcome = self.step_loop(conversation, emitter, &token) => outcome,
            outcome = watchdog => outcome,
        };

        match &outcome {
            Ok(report) => {
                info!(
                    conversation_id = %conversation_id,
                    round_trips = report.round_trips,
                    tools = ?report.used_tools,
                    "Run completed"
                );
                emitter.finish(Ok(report.text.clone()));
            }
            Err(err) => {
                error!(conversation_id = %conversation_id, error = %err, "Run failed");
                emitter.finish(Err(err.reason().to_string()));
            }
        }
        outcome
    }

    async fn step_loop(
        &self,
        mut conversation: Conversation,
        emitter: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let limit = self.settings.round_trip_limit;
        let mut round_trips: u32 = 0;
        let mut state = LoopState::Reasoning;

        loop {
            state = match state {
                LoopState::Reasoning => {
                    emitter.emit(ProgressEvent::StepStarted {
                        step: StepKind::Reasoning,
                        round_trip: round_trips,
                    });
                    info!(conversation_id = %conversation.id, round_trip = round_trips, "Reasoning");

                    match self.reasoning.reason(&conversation, cancel).await {
                        Ok(Message::AssistantRequest { text, actions }) if !actions.is_empty() => {
                            if round_trips >= limit {
                                LoopState::Failed(RunError::RoundTripLimitExceeded { limit })
                            } else {
                                conversation.push(Message::AssistantRequest {
                                    text: text.clone(),
                                    actions: actions.clone(),
                                });
                                emit_text(emitter, &text);
                                LoopState::Acting(actions)
                            }
                        }
                        Ok(Message::AssistantRequest { text, .. } | Message::AssistantFinal { text }) => {
                            conversation.push(Message::AssistantFinal { text: text.clone() });
                            emit_text(emitter, &text);
                            LoopState::Done(text)
                        }
                        Ok(other) => LoopState::Failed(RunError::Internal(format!(
                            "reasoning step produced a {} message",
                            other.kind()
                        ))),
                        Err(err) => LoopState::Failed(err),
                    }
                }

                LoopState::Acting(actions) => {
                    emitter.emit(ProgressEvent::StepStarted {
                        step: StepKind::Acting,
                        round_trip: round_trips,
                    });
                    info!(
                        conversation_id = %conversation.id,
                        round_trip = round_trips,
                        actions = actions.len(),
                        "Acting"
                    );

                    match self.dispatcher.dispatch(&actions, emitter, cancel).await {
                        Ok(results) => {
                            for result in results {
                                conversation.push(result);
                            }
                            round_trips += 1;

                            let pending = conversation.pending_action_ids();
                            if pending.is_empty() {
                                LoopState::Reasoning
                            } else {
                                LoopState::Failed(RunError::Internal(format!(
                                    "actions left unanswered: {}",
                                    pending.join(", ")
                                )))
                            }
                        }
                        Err(err) => LoopState::Failed(err),
                    }
                }

                LoopState::Done(text) => {
                    conversation
                        .check_invariants()
                        .map_err(|v| RunError::Internal(v.to_string()))?;
                    return Ok(RunReport {
                        text,
                        used_tools: conversation.used_tools(),
                        round_trips,
                        conversation,
                    });
                }

                LoopState::Failed(err) => return Err(err),
            };
        }
    }
}

fn emit_text(emitter: &ProgressEmitter, text: &str) {
    if !text.is_empty() {
        emitter.emit(ProgressEvent::ContentChunk { text: text.to_string() });
    }
}
