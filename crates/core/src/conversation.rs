//! Conversation-related types.
//!
//! A [`Conversation`] keeps two logs side by side. The transcript is what
//! the user sees, in full. The context log holds only the real user and
//! assistant turns, and its tail is what gets sent back to the model as
//! memory.

use serde::{Deserialize, Serialize};

/// The first message of every transcript.
pub const WELCOME_MESSAGE: &str = "Hello! I'm here to listen and support you. \
I understand that everyone goes through difficult times, and I want you to \
know that your feelings are valid.

How are you feeling today? You can share anything that's on your mind - I'm \
here to listen without judgment. 💙";

/// Shown in place of a reply when the model could not be reached.
pub const APOLOGY_MESSAGE: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again.";

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting.
    User,
    /// The model, or a canned message shown on its behalf.
    Assistant,
    /// Instructions for the model.
    System,
}

/// A message in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    text: String,
}

impl Message {
    /// Creates a message.
    #[inline]
    pub fn new<S: Into<String>>(role: Role, text: S) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, text)
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Returns the author of the message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of the message.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Represents a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    transcript: Vec<Message>,
    context_log: Vec<Message>,
}

impl Default for Conversation {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Creates a conversation whose transcript holds the welcome message.
    pub fn new() -> Self {
        Self {
            transcript: vec![Message::assistant(WELCOME_MESSAGE)],
            context_log: Vec::new(),
        }
    }

    /// Records a user turn in both logs.
    pub fn append_user<S: Into<String>>(&mut self, text: S) {
        self.append_turn(Message::user(text));
    }

    /// Records an assistant turn in both logs.
    pub fn append_assistant<S: Into<String>>(&mut self, text: S) {
        self.append_turn(Message::assistant(text));
    }

    /// Shows an assistant message without making it part of the model's
    /// memory.
    pub fn append_notice<S: Into<String>>(&mut self, text: S) {
        self.transcript.push(Message::assistant(text));
    }

    /// Clears both logs and puts the welcome message back.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.context_log.clear();
        self.transcript.push(Message::assistant(WELCOME_MESSAGE));
    }

    /// Returns the last `n` entries of the context log, oldest first.
    #[inline]
    pub fn context_window(&self, n: usize) -> &[Message] {
        let start = self.context_log.len().saturating_sub(n);
        &self.context_log[start..]
    }

    /// Returns every message shown to the user.
    #[inline]
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Returns every turn that can be fed back to the model.
    #[inline]
    pub fn context_log(&self) -> &[Message] {
        &self.context_log
    }

    fn append_turn(&mut self, msg: Message) {
        debug_assert!(msg.role != Role::System);
        self.transcript.push(msg.clone());
        self.context_log.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks that the context log is the transcript restricted to
    /// user/assistant turns, in the same relative order.
    fn is_subsequence(conversation: &Conversation) -> bool {
        let mut transcript = conversation.transcript().iter();
        conversation
            .context_log()
            .iter()
            .all(|msg| transcript.any(|m| m == msg))
    }

    #[test]
    fn test_new_conversation() {
        let conversation = Conversation::new();
        assert_eq!(
            conversation.transcript(),
            &[Message::assistant(WELCOME_MESSAGE)]
        );
        assert!(conversation.context_log().is_empty());
        assert!(conversation.context_window(10).is_empty());
    }

    #[test]
    fn test_transcript_length() {
        let mut conversation = Conversation::new();
        for k in 1..=25 {
            if k % 2 == 0 {
                conversation.append_assistant(format!("reply {k}"));
            } else {
                conversation.append_user(format!("message {k}"));
            }
            assert_eq!(conversation.transcript().len(), k + 1);
            assert_eq!(conversation.context_log().len(), k);
        }
        assert!(is_subsequence(&conversation));
    }

    #[test]
    fn test_context_window() {
        let mut conversation = Conversation::new();
        for i in 0..14 {
            conversation.append_user(format!("{i}"));
        }

        for n in [0, 1, 5, 10, 14, 20] {
            let window = conversation.context_window(n);
            assert_eq!(window.len(), n.min(14));
            assert_eq!(window, &conversation.context_log()[14 - n.min(14)..]);
        }

        let window = conversation.context_window(10);
        assert_eq!(window.first().unwrap().text(), "4");
        assert_eq!(window.last().unwrap().text(), "13");

        // Reading never mutates.
        assert_eq!(conversation.context_window(10), window);
        assert_eq!(conversation.context_log().len(), 14);
    }

    #[test]
    fn test_reset() {
        let mut conversation = Conversation::new();
        conversation.append_user("I feel anxious");
        conversation.append_assistant("I hear you.");
        conversation.append_notice(APOLOGY_MESSAGE);

        conversation.reset();
        assert_eq!(conversation, Conversation::new());

        conversation.reset();
        assert_eq!(conversation.transcript().len(), 1);
        assert!(conversation.context_log().is_empty());
    }

    #[test]
    fn test_notice_is_display_only() {
        let mut conversation = Conversation::new();
        conversation.append_user("Hi");
        conversation.append_notice(APOLOGY_MESSAGE);

        assert_eq!(conversation.transcript().len(), 3);
        assert_eq!(conversation.context_log(), &[Message::user("Hi")]);
        assert!(is_subsequence(&conversation));
    }

    #[test]
    fn test_message_serialization() {
        let value = serde_json::to_value(Message::user("Hi")).unwrap();
        assert_eq!(value, serde_json::json!({ "role": "user", "text": "Hi" }));
    }
}
