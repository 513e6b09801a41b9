//! # Wayfarer Core
//!
//! Domain types, traits, and error definitions for the Wayfarer travel assistant.
//! This crate has **no framework dependencies** beyond the async runtime
//! primitives; it defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Collaborators are traits here, implementations live in their own crates:
//! - [`Provider`]: the reasoning service (LLM backend)
//! - [`Tool`]: a named action the reasoning service may request
//!
//! The [`retry`] module holds the resilient caller. It is domain-agnostic and
//! wraps any fallible async operation whose error implements [`Classify`].

pub mod error;
pub mod message;
pub mod provider;
pub mod retry;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, ToolError};
pub use message::{ActionCall, Conversation, ConversationId, InvariantViolation, Message};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use retry::{Classify, ErrorClass, RetryError, RetryPolicy};
pub use tool::{Tool, ToolDefinition, ToolRegistry, ToolRegistryBuilder};
