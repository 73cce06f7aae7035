use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// A streamed reply from the model provider.
///
/// Events arrive in generation order: any number of
/// [`ModelResponseEvent::MessageDelta`] followed by one
/// [`ModelResponseEvent::Completed`].
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Polls for the next event.
    ///
    /// Resolves to `Ok(None)` once the reply is over, and keeps doing so
    /// on later calls. An `Err` means the stream broke off and no further
    /// events should be expected.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The reply is complete.
    Stop,
    /// The output was cut off by the token limit.
    Length,
}

/// An event of a [`ModelResponse`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// No more text will follow.
    Completed(ModelFinishReason),
    /// The next piece of reply text.
    MessageDelta(String),
}
