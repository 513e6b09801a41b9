//! Action step: runs the tools one reasoning output asked for.
//!
//! Every call runs as its own Tokio task with semaphore-bounded concurrency.
//! Results are drained through `FuturesOrdered`, so they come back in call
//! order no matter which tool finishes first. Tool failures of any kind
//! become error payloads; only cancellation aborts the step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::FuturesOrdered;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wayfarer_core::error::ToolError;
use wayfarer_core::message::{ActionCall, Message};
use wayfarer_core::tool::ToolRegistry;

use crate::emitter::ProgressEmitter;
use crate::error::RunError;
use crate::settings::LoopSettings;
use crate::stream_event::{ProgressEvent, preview};

/// Outcome of one spawned call. `None` means it never started.
type TaskOutcome = Option<Result<serde_json::Value, ToolError>>;

#[derive(Clone)]
pub struct ActionDispatcher {
    tools: Arc<ToolRegistry>,
    max_concurrency: usize,
    tool_timeout: Duration,
    cancel_grace: Duration,
}

/// Aborts every task still running when dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

impl ActionDispatcher {
    pub fn new(tools: Arc<ToolRegistry>, settings: &LoopSettings) -> Self {
        Self {
            tools,
            max_concurrency: settings.max_tool_concurrency.max(1),
            tool_timeout: settings.tool_timeout,
            cancel_grace: settings.cancel_grace,
        }
    }

    /// Execute `calls` and return one `ActionResult` per call, in call order.
    pub async fn dispatch(
        &self,
        calls: &[ActionCall],
        emitter: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, RunError> {
        // 1. Announce every call upfront
        for call in calls {
            emitter.emit(ProgressEvent::ActionRequested {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            });
        }

        // 2. Spawn each call, bounded by the semaphore
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut guard = AbortOnDrop(Vec::with_capacity(calls.len()));
        let mut ordered = FuturesOrdered::new();

        for call in calls {
            let tools = Arc::clone(&self.tools);
            let sem = Arc::clone(&semaphore);
            let task_cancel = cancel.clone();
            let task_call = call.clone();
            let timeout = self.tool_timeout;

            let handle = tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => return None,
                    permit = sem.acquire_owned() => permit.ok()?,
                };
                if task_cancel.is_cancelled() {
                    return None;
                }
                Some(run_tool(&tools, &task_call, timeout).await)
            });

            guard.0.push(handle.abort_handle());
            let call = call.clone();
            ordered.push_back(async move { (call, handle.await) });
        }

        // 3. Drain in call order
        let mut results = Vec::with_capacity(calls.len());
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = ordered.next() => match next {
                    Some(item) => Some(item),
                    None => break,
                },
            };

            let Some((call, joined)) = next else {
                self.wind_down(&mut ordered).await;
                return Err(RunError::Cancelled);
            };

            let Some(message) = to_message(&call, joined) else {
                self.wind_down(&mut ordered).await;
                return Err(RunError::Cancelled);
            };

            if let Message::ActionResult { payload, is_error, .. } = &message {
                emitter.emit(ProgressEvent::ActionCompleted {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    success: !is_error,
                    preview: preview(payload),
                });
            }
            results.push(message);
        }

        drop(guard);
        Ok(results)
    }

    /// Give in-flight tools the grace period, then let the guard abort them.
    async fn wind_down<F>(&self, ordered: &mut FuturesOrdered<F>)
    where
        F: std::future::Future,
    {
        let started = Instant::now();
        let drained = tokio::time::timeout(self.cancel_grace, async {
            while ordered.next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "In-flight tools finished after cancellation"
            ),
            Err(_) => warn!(
                grace_ms = self.cancel_grace.as_millis() as u64,
                "Tools still running after grace period, aborting"
            ),
        }
    }
}

async fn run_tool(
    tools: &ToolRegistry,
    call: &ActionCall,
    timeout: Duration,
) -> Result<serde_json::Value, ToolError> {
    let tool = tools
        .get(&call.name)
        .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

    let started = Instant::now();
    let arguments = serde_json::Value::Object(call.arguments.clone());
    let result = match tokio::time::timeout(timeout, tool.execute(arguments)).await {
        Ok(result) => result,
        Err(_) => Err(ToolError::Timeout {
            tool_name: call.name.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    };

    debug!(
        tool = %call.name,
        call_id = %call.id,
        success = result.is_ok(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Tool finished"
    );
    result
}

/// Map a joined task to its conversation message. `None` means the call was
/// cancelled rather than answered.
fn to_message(call: &ActionCall, joined: Result<TaskOutcome, JoinError>) -> Option<Message> {
    match joined {
        Ok(Some(Ok(payload))) => Some(Message::action_result(call, payload)),
        Ok(Some(Err(err))) => {
            warn!(tool = %call.name, call_id = %call.id, error = %err, "Tool execution failed");
            Some(Message::action_error(call, &err))
        }
        Ok(None) => None,
        Err(e) if e.is_panic() => {
            let err = ToolError::Panicked {
                tool_name: call.name.clone(),
            };
            warn!(tool = %call.name, call_id = %call.id, "Tool task panicked");
            Some(Message::action_error(call, &err))
        }
        Err(_) => None,
    }
}
