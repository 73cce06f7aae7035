//! A web chat that offers a calm, supportive listener.
//!
//! The server keeps one conversation per browser tab and streams replies
//! from an OpenAI-compatible chat completion API, Groq by default. Besides
//! free-text chatting, the page offers a few canned self-care suggestions
//! that work even without an API key.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod registry;
mod web;

pub use config::{ConfigError, DEFAULT_ADDR, SETUP_INSTRUCTIONS, Settings};
pub use registry::{DEFAULT_IDLE_TIMEOUT, SessionRegistry};
pub use web::{AppState, router};

/// Re-exports of [`mindful_chat_core`] crate.
pub mod core {
    pub use mindful_chat_core::*;
}
