//! Core logic of the chat: transcript and context bookkeeping, reply
//! streaming, canned self-care suggestions and the per-session turn cycle.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod error;
mod session;
mod streamer;
pub mod suggestion;

pub use conversation::{Conversation, Message, Role};
pub use error::{Error, ErrorKind};
pub use session::{ChatSession, SessionHandle, Turn, TurnOutcome, TurnStage};
pub use streamer::{
    DEFAULT_CONTEXT_WINDOW, DEFAULT_SYSTEM_PROMPT, Fragments, ResponseStreamer,
    ResponseStreamerBuilder,
};
pub use suggestion::Suggestion;
