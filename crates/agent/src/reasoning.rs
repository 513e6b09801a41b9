//! Reasoning step: one resilient call to the reasoning service.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wayfarer_core::message::{ActionCall, Conversation, Message};
use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse};
use wayfarer_core::retry::{self, RetryError, RetryPolicy};
use wayfarer_core::tool::ToolRegistry;
use wayfarer_core::ProviderError;

use crate::error::RunError;
use crate::settings::LoopSettings;

/// Asks the reasoning service what to do next.
#[derive(Clone)]
pub struct ReasoningStep {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ReasoningStep {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, settings: &LoopSettings) -> Self {
        Self {
            provider,
            tools,
            model: settings.model.clone(),
            system_prompt: settings.system_prompt.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: settings.reasoning_timeout,
            retry: settings.retry.clone(),
        }
    }

    fn build_request(&self, conversation: &Conversation) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            messages: conversation.messages().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
        }
    }

    /// Call the service with retries and classify the answer.
    ///
    /// Returns `Message::AssistantRequest` when actions were requested,
    /// `Message::AssistantFinal` otherwise. The conversation is not modified.
    pub async fn reason(
        &self,
        conversation: &Conversation,
        cancel: &CancellationToken,
    ) -> Result<Message, RunError> {
        let request = self.build_request(conversation);
        let provider = &self.provider;
        let timeout = self.timeout;

        let outcome = retry::execute_observed(
            &self.retry,
            cancel,
            || {
                let request = request.clone();
                async move {
                    match tokio::time::timeout(timeout, provider.complete(request)).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(format!(
                            "reasoning call exceeded {}ms",
                            timeout.as_millis()
                        ))),
                    }
                }
            },
            |attempt, delay, err| {
                warn!(
                    conversation_id = %conversation.id,
                    provider = provider.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Reasoning call failed, retrying"
                );
            },
        )
        .await;

        let response = match outcome {
            Ok(response) => response,
            Err(RetryError::Exhausted { attempts, last }) => {
                return Err(RunError::RetriesExhausted { attempts, last });
            }
            Err(RetryError::Permanent(err)) => return Err(RunError::ReasoningRejected(err)),
            Err(RetryError::Cancelled) => return Err(RunError::Cancelled),
        };

        if let Some(usage) = &response.usage {
            debug!(
                conversation_id = %conversation.id,
                model = %response.model,
                total_tokens = usage.total_tokens,
                "Reasoning call completed"
            );
        }

        Ok(classify(conversation, response))
    }
}

/// Turn a raw response into the next conversation message.
///
/// Action ids that are empty or already used in the conversation are replaced
/// with fresh ones so every call can be answered unambiguously.
fn classify(conversation: &Conversation, response: ProviderResponse) -> Message {
    let ProviderResponse { text, actions, .. } = response;

    if actions.is_empty() {
        return Message::AssistantFinal { text };
    }

    let mut used: HashSet<String> = conversation
        .messages()
        .iter()
        .filter_map(|m| match m {
            Message::AssistantRequest { actions, .. } => Some(actions),
            _ => None,
        })
        .flatten()
        .map(|a| a.id.clone())
        .collect();

    let actions = actions
        .into_iter()
        .map(|mut action| {
            if action.id.trim().is_empty() || used.contains(&action.id) {
                action.id = ActionCall::generate_id();
            }
            used.insert(action.id.clone());
            action
        })
        .collect();

    Message::AssistantRequest { text, actions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued outcomes in order, then fails.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::NotConfigured("script exhausted".into())))
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            std::future::pending().await
        }
    }

    fn step(provider: Arc<dyn Provider>) -> ReasoningStep {
        ReasoningStep::new(provider, Arc::new(ToolRegistry::empty()), &LoopSettings::default())
    }

    fn call(id: &str, name: &str) -> ActionCall {
        ActionCall::new(id, name, serde_json::Map::new())
    }

    #[tokio::test(start_paused = true)]
    async fn text_only_is_final() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ProviderResponse::text("Pack light."))]));
        let message = step(provider)
            .reason(&Conversation::new("tips?"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message, Message::AssistantFinal { text: "Pack light.".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn actions_become_request() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ProviderResponse::actions(vec![
            call("a", "get_weather"),
        ]))]));
        let message = step(provider)
            .reason(&Conversation::new("weather?"), &CancellationToken::new())
            .await
            .unwrap();
        let Message::AssistantRequest { actions, .. } = message else {
            panic!("expected request");
        };
        assert_eq!(actions, vec![call("a", "get_weather")]);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Network("reset".into())),
            Err(ProviderError::ApiError {
                status_code: 503,
                message: "busy".into(),
            }),
            Ok(ProviderResponse::text("Recovered.")),
        ]));
        let message = step(provider.clone())
            .reason(&Conversation::new("hi"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message, Message::AssistantFinal { text: "Recovered.".into() });
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_rejected_after_one_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let err = step(provider.clone())
            .reason(&Conversation::new("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "reasoning call rejected");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_call_times_out_and_exhausts() {
        let mut settings = LoopSettings::default();
        settings.reasoning_timeout = Duration::from_secs(5);
        let step = ReasoningStep::new(Arc::new(HangingProvider), Arc::new(ToolRegistry::empty()), &settings);

        let err = step
            .reason(&Conversation::new("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            RunError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, ProviderError::Timeout(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_and_empty_ids_are_replaced() {
        let mut conversation = Conversation::new("hi");
        conversation.push(Message::AssistantRequest {
            text: String::new(),
            actions: vec![call("a", "get_weather")],
        });
        conversation.push(Message::action_result(&call("a", "get_weather"), serde_json::json!({})));

        let message = classify(
            &conversation,
            ProviderResponse::actions(vec![
                call("a", "get_weather"),
                call("", "search_flights"),
                call("b", "find_attractions"),
                call("b", "find_attractions"),
            ]),
        );
        let Message::AssistantRequest { actions, .. } = message else {
            panic!("expected request");
        };

        let ids: HashSet<_> = actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        assert!(!ids.contains("a"));
        assert!(ids.contains("b"));
        assert_eq!(actions[2].id, "b");
    }
}
