//! Progress emitter: the producer/consumer pair behind incremental mode.
//!
//! The orchestration loop pushes [`ProgressEvent`]s synchronously; a single
//! subscriber drains them as a [`futures::Stream`]. The queue is bounded for
//! text: once it holds `capacity` events, new content chunks are merged into
//! the trailing chunk. Structural events are always kept.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use futures::task::AtomicWaker;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::stream_event::ProgressEvent;

/// Reason reported when an emitter goes away without finishing.
const DROPPED_REASON: &str = "cancelled";

#[derive(Default)]
struct Queue {
    events: VecDeque<ProgressEvent>,
    terminated: bool,
    subscriber_gone: bool,
    coalesced: u64,
}

struct Shared {
    queue: Mutex<Queue>,
    waker: AtomicWaker,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer half. Owned by the loop that drives one request.
pub struct ProgressEmitter {
    shared: Arc<Shared>,
    capacity: usize,
}

impl ProgressEmitter {
    /// Create a connected emitter/stream pair. `capacity` of 0 is treated as 1.
    pub fn channel(capacity: usize) -> (ProgressEmitter, ProgressStream) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            waker: AtomicWaker::new(),
        });
        let emitter = ProgressEmitter {
            shared: Arc::clone(&shared),
            capacity: capacity.max(1),
        };
        let stream = ProgressStream {
            shared,
            ended: false,
            cancel_guard: None,
        };
        (emitter, stream)
    }

    /// An emitter nobody listens to. Used by buffered mode.
    pub fn detached() -> Self {
        let (emitter, stream) = Self::channel(1);
        drop(stream);
        emitter
    }

    /// Push an event. Never blocks on the consumer.
    ///
    /// Terminal events are routed through [`finish`](Self::finish) semantics:
    /// only the first one is kept.
    pub fn emit(&self, event: ProgressEvent) {
        let mut queue = self.shared.lock();
        if queue.terminated || queue.subscriber_gone {
            return;
        }

        if event.is_terminal() {
            queue.terminated = true;
            queue.events.push_back(event);
        } else if let ProgressEvent::ContentChunk { text } = &event
            && queue.events.len() >= self.capacity
            && let Some(ProgressEvent::ContentChunk { text: tail }) = queue.events.back_mut()
        {
            tail.push_str(text);
            queue.coalesced += 1;
            debug!(
                queued = queue.events.len(),
                coalesced = queue.coalesced,
                "Progress queue full, merged content chunk"
            );
        } else {
            queue.events.push_back(event);
        }

        drop(queue);
        self.shared.waker.wake();
    }

    /// Push the single terminal event. Later calls are ignored.
    pub fn finish(&self, outcome: Result<String, String>) {
        let event = match outcome {
            Ok(text) => ProgressEvent::Done { text },
            Err(reason) => ProgressEvent::Failed { reason },
        };
        self.emit(event);
    }

    pub fn is_finished(&self) -> bool {
        self.shared.lock().terminated
    }

    /// Whether the subscriber has gone away.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().subscriber_gone
    }

    /// How many content chunks were merged under backpressure.
    pub fn coalesced(&self) -> u64 {
        self.shared.lock().coalesced
    }
}

impl Drop for ProgressEmitter {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.finish(Err(DROPPED_REASON.into()));
        }
    }
}

/// Consumer half. Ends after the terminal event.
///
/// When built with [`with_cancel_on_drop`](Self::with_cancel_on_drop),
/// dropping the stream before the terminal event cancels the run.
pub struct ProgressStream {
    shared: Arc<Shared>,
    ended: bool,
    cancel_guard: Option<DropGuard>,
}

impl ProgressStream {
    pub fn with_cancel_on_drop(mut self, token: CancellationToken) -> Self {
        self.cancel_guard = Some(token.drop_guard());
        self
    }

    fn end(&mut self) {
        self.ended = true;
        if let Some(guard) = self.cancel_guard.take() {
            guard.disarm();
        }
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.ended {
            return Poll::Ready(None);
        }

        // Register before looking so a concurrent push is never missed.
        this.shared.waker.register(cx.waker());

        let next = this.shared.lock().events.pop_front();
        match next {
            Some(event) => {
                if event.is_terminal() {
                    this.end();
                }
                Poll::Ready(Some(event))
            }
            None => Poll::Pending,
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        let mut queue = self.shared.lock();
        queue.subscriber_gone = true;
        queue.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_event::StepKind;
    use futures::StreamExt;

    fn chunk(text: &str) -> ProgressEvent {
        ProgressEvent::ContentChunk { text: text.into() }
    }

    fn step(round_trip: u32) -> ProgressEvent {
        ProgressEvent::StepStarted {
            step: StepKind::Reasoning,
            round_trip,
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_ends_after_terminal() {
        let (emitter, stream) = ProgressEmitter::channel(16);
        emitter.emit(step(0));
        emitter.emit(chunk("hello"));
        emitter.finish(Ok("hello".into()));
        emitter.emit(chunk("ignored"));

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![step(0), chunk("hello"), ProgressEvent::Done { text: "hello".into() }]
        );
    }

    #[tokio::test]
    async fn only_first_terminal_is_kept() {
        let (emitter, stream) = ProgressEmitter::channel(16);
        emitter.finish(Err("retries exhausted".into()));
        emitter.finish(Ok("late".into()));
        drop(emitter);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![ProgressEvent::Failed {
                reason: "retries exhausted".into()
            }]
        );
    }

    #[tokio::test]
    async fn dropping_unfinished_emitter_reports_cancelled() {
        let (emitter, stream) = ProgressEmitter::channel(16);
        emitter.emit(step(0));
        drop(emitter);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.last(), Some(&ProgressEvent::Failed { reason: "cancelled".into() }));
    }

    #[tokio::test]
    async fn coalesces_chunks_but_keeps_structural_events() {
        let (emitter, stream) = ProgressEmitter::channel(2);
        emitter.emit(step(0));
        emitter.emit(chunk("a"));
        // queue is full from here on
        emitter.emit(chunk("b"));
        emitter.emit(chunk("c"));
        emitter.emit(ProgressEvent::ActionCompleted {
            id: "1".into(),
            name: "get_weather".into(),
            success: true,
            preview: "{}".into(),
        });
        emitter.emit(chunk("d"));
        emitter.emit(chunk("e"));
        emitter.finish(Ok("abcde".into()));

        assert_eq!(emitter.coalesced(), 3);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                step(0),
                chunk("abc"),
                ProgressEvent::ActionCompleted {
                    id: "1".into(),
                    name: "get_weather".into(),
                    success: true,
                    preview: "{}".into(),
                },
                chunk("de"),
                ProgressEvent::Done { text: "abcde".into() },
            ]
        );
    }

    #[tokio::test]
    async fn consumer_wakes_on_emit() {
        let (emitter, mut stream) = ProgressEmitter::channel(4);
        let consumer = tokio::spawn(async move { stream.next().await });

        tokio::task::yield_now().await;
        emitter.emit(chunk("late"));

        assert_eq!(consumer.await.unwrap(), Some(chunk("late")));
    }

    #[tokio::test]
    async fn dropping_stream_cancels_run() {
        let token = CancellationToken::new();
        let (emitter, stream) = ProgressEmitter::channel(4);
        let stream = stream.with_cancel_on_drop(token.clone());

        drop(stream);
        assert!(token.is_cancelled());
        assert!(emitter.is_closed());
        emitter.emit(chunk("nobody listens"));
    }

    #[tokio::test]
    async fn completed_stream_does_not_cancel() {
        let token = CancellationToken::new();
        let (emitter, stream) = ProgressEmitter::channel(4);
        let mut stream = stream.with_cancel_on_drop(token.clone());

        emitter.finish(Ok("done".into()));
        assert!(stream.next().await.unwrap().is_terminal());
        assert!(stream.next().await.is_none());
        drop(stream);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn detached_emitter_discards_events() {
        let emitter = ProgressEmitter::detached();
        assert!(emitter.is_closed());
        emitter.emit(chunk("x"));
        emitter.finish(Ok("y".into()));
        assert!(!emitter.is_finished());
    }
}
