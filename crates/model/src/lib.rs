//! An abstraction layer for hosted chat-completion models.
//!
//! This crate establishes a small protocol between the chat core and the
//! services that actually generate replies, so that the core can stream
//! from any OpenAI-compatible endpoint (or a scripted fake in tests)
//! without knowing about wire formats.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
