//! The orchestration loop, the heart of Wayfarer.
//!
//! Each request runs a **Reason → Act** cycle:
//!
//! 1. **Seed** a conversation with the user's request
//! 2. **Reason**: call the provider (with retries) on the full conversation
//! 3. **Act**: if actions were requested, run the tools and append results
//!    in call order, then go back to step 2
//! 4. **Finish** when the provider answers without requesting actions
//!
//! The loop stops early on an unrecoverable provider error, cancellation,
//! or when the round-trip limit is reached. Every transition is published
//! as a [`ProgressEvent`] for streaming callers.

pub mod dispatch;
pub mod emitter;
pub mod error;
pub mod loop_runner;
pub mod reasoning;
pub mod settings;
pub mod stream_event;

pub use dispatch::ActionDispatcher;
pub use emitter::{ProgressEmitter, ProgressStream};
pub use error::RunError;
pub use loop_runner::{LoopState, Orchestrator, RunReport};
pub use reasoning::ReasoningStep;
pub use settings::LoopSettings;
pub use stream_event::{ProgressEvent, StepKind};
