//! Reasoning-service clients for Wayfarer.
//!
//! All providers implement the `wayfarer_core::Provider` trait.
//! The router builds the configured provider.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, default_base_url};
