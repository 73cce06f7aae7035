use std::sync::Arc;

use futures_util::StreamExt;
use mindful_chat_model::ModelFinishReason;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::conversation::{APOLOGY_MESSAGE, Conversation, Message};
use crate::error::Error;
use crate::streamer::ResponseStreamer;
use crate::suggestion::Suggestion;

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<ChatSession>>;

/// Where the session is in the current turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TurnStage {
    /// Ready for input.
    #[default]
    Idle,
    /// Waiting for the remote service to accept the request.
    Requesting,
    /// Fragments are arriving.
    Streaming,
}

/// The state owned by one chat session.
///
/// Only one turn can be in flight. While it is, every operation that
/// would change the logs fails with a `Busy` error.
#[derive(Debug, Default)]
pub struct ChatSession {
    conversation: Conversation,
    stage: TurnStage,
    active_turn: Option<u64>,
    next_turn_id: u64,
}

impl ChatSession {
    /// Creates a fresh session.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the session into a shareable handle.
    #[inline]
    pub fn into_handle(self) -> SessionHandle {
        Arc::new(Mutex::new(self))
    }

    /// Returns the conversation.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the stage of the current turn.
    #[inline]
    pub fn stage(&self) -> TurnStage {
        self.stage
    }

    /// Returns `true` while a reply is being generated.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.stage != TurnStage::Idle
    }

    /// Starts over with only the welcome message.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.ensure_idle()?;
        self.conversation.reset();
        debug!("session reset");
        Ok(())
    }

    /// Appends a canned suggestion and returns it.
    pub fn suggest(&mut self, suggestion: Suggestion) -> Result<Message, Error> {
        self.ensure_idle()?;
        let msg = Message::assistant(suggestion.text());
        self.conversation.append_assistant(msg.text());
        debug!("appended suggestion {suggestion}");
        Ok(msg)
    }

    /// Records the user message and moves to `Requesting`.
    ///
    /// Returns the id of the new turn together with the last `window`
    /// context entries that preceded the message.
    fn begin_turn(
        &mut self,
        text: &str,
        window: usize,
    ) -> Result<(u64, Vec<Message>), Error> {
        self.ensure_idle()?;
        if text.trim().is_empty() {
            return Err(Error::empty_input());
        }

        let context = self.conversation.context_window(window).to_vec();
        self.conversation.append_user(text);

        let id = self.next_turn_id;
        self.next_turn_id += 1;
        self.active_turn = Some(id);
        self.stage = TurnStage::Requesting;
        Ok((id, context))
    }

    fn mark_streaming(&mut self, id: u64) {
        if self.active_turn == Some(id) {
            self.stage = TurnStage::Streaming;
        }
    }

    fn complete_turn(&mut self, id: u64, text: String) -> Option<Message> {
        self.end_turn(id)?;
        let msg = Message::assistant(text);
        self.conversation.append_assistant(msg.text());
        Some(msg)
    }

    fn fail_turn(&mut self, id: u64) -> Option<Message> {
        self.end_turn(id)?;
        self.conversation.append_notice(APOLOGY_MESSAGE);
        Some(Message::assistant(APOLOGY_MESSAGE))
    }

    fn abandon_turn(&mut self, id: u64) {
        self.end_turn(id);
    }

    fn end_turn(&mut self, id: u64) -> Option<()> {
        if self.active_turn != Some(id) {
            warn!("turn {id} is not the active turn");
            return None;
        }
        self.active_turn = None;
        self.stage = TurnStage::Idle;
        Some(())
    }

    #[inline]
    fn ensure_idle(&self) -> Result<(), Error> {
        if self.is_busy() {
            return Err(Error::busy());
        }
        Ok(())
    }
}

/// How a turn ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was assembled and appended to both logs.
    Completed(Message),
    /// The remote service failed. The apology was shown instead.
    Failed {
        /// The apology appended to the transcript.
        apology: Message,
        /// What went wrong.
        error: Error,
    },
    /// The consumer went away. Nothing was appended for the reply.
    Abandoned,
}

/// One user message and the reply generated for it.
///
/// A turn is started with [`Turn::begin`], which records the user message
/// right away, and driven to completion with [`Turn::run`].
pub struct Turn {
    session: SessionHandle,
    streamer: ResponseStreamer,
    id: u64,
    context: Vec<Message>,
    user_text: String,
    finished: bool,
}

impl Turn {
    /// Records `text` as a user turn and reserves the session.
    ///
    /// Fails with `Busy` if another turn is in flight and with
    /// `EmptyInput` if the text is blank. Neither changes the session.
    pub async fn begin(
        session: &SessionHandle,
        streamer: &ResponseStreamer,
        text: &str,
    ) -> Result<Turn, Error> {
        let (id, context) = session
            .lock()
            .await
            .begin_turn(text, streamer.context_window())?;
        debug!("turn {id} started with {} context entries", context.len());
        Ok(Turn {
            session: Arc::clone(session),
            streamer: streamer.clone(),
            id,
            context,
            user_text: text.to_owned(),
            finished: false,
        })
    }

    /// Returns the user message of this turn.
    #[inline]
    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    /// Streams the reply, handing each fragment to `on_fragment` as soon as
    /// it arrives.
    ///
    /// `on_fragment` returns `false` when nobody is listening anymore, which
    /// abandons the turn.
    pub async fn run<F>(mut self, on_fragment: F) -> TurnOutcome
    where
        F: FnMut(&str) -> bool,
    {
        let span = trace_span!("turn", id = self.id);
        let outcome = self.drive(on_fragment).instrument(span).await;
        self.finished = true;
        outcome
    }

    async fn drive<F>(&mut self, mut on_fragment: F) -> TurnOutcome
    where
        F: FnMut(&str) -> bool,
    {
        let mut fragments =
            match self.streamer.stream(&self.context, &self.user_text).await {
                Ok(fragments) => fragments,
                Err(error) => return self.fail(error).await,
            };
        self.session.lock().await.mark_streaming(self.id);

        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(error) => return self.fail(error).await,
            };
            text.push_str(&fragment);
            if !on_fragment(&fragment) {
                debug!("consumer went away, abandoning the reply");
                self.session.lock().await.abandon_turn(self.id);
                return TurnOutcome::Abandoned;
            }
        }

        if fragments.finish_reason() == Some(ModelFinishReason::Length) {
            warn!("reply was cut off by the token limit");
        }
        if text.is_empty() {
            let error = Error::service_unavailable()
                .with_reason("the model returned an empty reply");
            return self.fail(error).await;
        }

        match self.session.lock().await.complete_turn(self.id, text) {
            Some(msg) => {
                debug!("reply completed");
                TurnOutcome::Completed(msg)
            }
            None => TurnOutcome::Abandoned,
        }
    }

    async fn fail(&mut self, error: Error) -> TurnOutcome {
        warn!("turn failed: {error}");
        match self.session.lock().await.fail_turn(self.id) {
            Some(apology) => TurnOutcome::Failed { apology, error },
            None => TurnOutcome::Abandoned,
        }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The turn was never run to the end, release the session so it
        // does not stay busy forever.
        match self.session.try_lock() {
            Ok(mut session) => session.abandon_turn(self.id),
            Err(_) => error!("turn {} dropped while the session was locked", self.id),
        }
    }
}
