use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use mindful_chat_model::{
    ModelFinishReason, ModelMessage, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, Sampling,
};
use tracing::Instrument;

use crate::conversation::{Message, Role};
use crate::error::Error;

/// The persona and behavior instructions sent ahead of every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

/// How many context log entries are sent with each request.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

type ProviderError = Box<dyn ModelProviderError>;
type SendRequestResult = Result<Pin<Box<dyn ErasedResponse>>, ProviderError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// Object-safe view of a [`ModelResponse`].
trait ErasedResponse: Send {
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, ProviderError>>;
}

impl<R: ModelResponse> ErasedResponse for R {
    #[inline]
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, ProviderError>> {
        ModelResponse::poll_next_event(self, cx)
            .map_err(|err| Box::new(err) as ProviderError)
    }
}

/// [`ResponseStreamer`] builder.
pub struct ResponseStreamerBuilder {
    handler_fn: HandlerFn,
    system_prompt: Option<String>,
    sampling: Sampling,
    context_window: usize,
}

impl ResponseStreamerBuilder {
    /// Creates a new builder with the specified model provider.
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        // We have to erase the type `P`, since `ResponseStreamer` is shared
        // by every session and we don't want a generic parameter on it.
        let handler_fn: HandlerFn = Arc::new(move |req: ModelRequest| {
            let fut = provider.send_request(&req);
            Box::pin(async move {
                match fut.await {
                    Ok(resp) => {
                        Ok(Box::pin(resp) as Pin<Box<dyn ErasedResponse>>)
                    }
                    Err(err) => Err(Box::new(err) as ProviderError),
                }
            }) as BoxedSendRequestFuture
        });
        Self {
            handler_fn,
            system_prompt: None,
            sampling: Sampling::default(),
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    /// Overrides [`DEFAULT_SYSTEM_PROMPT`].
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Overrides the default sampling parameters.
    #[inline]
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Overrides [`DEFAULT_CONTEXT_WINDOW`].
    #[inline]
    pub fn with_context_window(mut self, n: usize) -> Self {
        self.context_window = n;
        self
    }

    /// Builds the streamer.
    #[inline]
    pub fn build(self) -> ResponseStreamer {
        let system_prompt = self
            .system_prompt
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.trim_end().to_owned());
        ResponseStreamer {
            handler_fn: self.handler_fn,
            system_prompt: system_prompt.into(),
            sampling: self.sampling,
            context_window: self.context_window,
        }
    }
}

/// Turns a context window and a new user message into a stream of reply
/// fragments.
///
/// The streamer itself is stateless and cheap to clone. It can be shared
/// by every session.
#[derive(Clone)]
pub struct ResponseStreamer {
    handler_fn: HandlerFn,
    system_prompt: Arc<str>,
    sampling: Sampling,
    context_window: usize,
}

impl ResponseStreamer {
    /// Returns how many context entries are sent with each request.
    #[inline]
    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Builds the request: the system prompt, then the context entries
    /// oldest first, then the new user message.
    pub fn build_request(
        &self,
        context: &[Message],
        user_text: &str,
    ) -> ModelRequest {
        let mut messages = Vec::with_capacity(context.len() + 2);
        messages.push(ModelMessage::System(self.system_prompt.to_string()));
        messages.extend(context.iter().filter_map(|msg| match msg.role() {
            Role::User => Some(ModelMessage::User(msg.text().to_owned())),
            Role::Assistant => {
                Some(ModelMessage::Assistant(msg.text().to_owned()))
            }
            Role::System => None,
        }));
        messages.push(ModelMessage::User(user_text.to_owned()));
        ModelRequest {
            messages,
            sampling: self.sampling,
        }
    }

    /// Opens a reply stream.
    ///
    /// Fails with `ServiceUnavailable` if the remote call cannot be
    /// established, in which case nothing has been streamed.
    pub async fn stream(
        &self,
        context: &[Message],
        user_text: &str,
    ) -> Result<Fragments, Error> {
        let req = self.build_request(context, user_text);
        trace!("sending request: {req:?}");
        let resp = (self.handler_fn)(req)
            .instrument(trace_span!("send request"))
            .await
            .map_err(|err| {
                error!("failed to open the reply stream: {err}");
                Error::service_unavailable().with_reason(err.to_string())
            })?;
        Ok(Fragments {
            response: Some(resp),
            finish_reason: None,
        })
    }
}

/// The fragments of one reply, in generation order.
///
/// Every item is either a non-empty piece of text, or a single
/// `ServiceUnavailable` error after which the stream ends. The stream
/// cannot be restarted, and dropping it abandons the remote response.
pub struct Fragments {
    response: Option<Pin<Box<dyn ErasedResponse>>>,
    finish_reason: Option<ModelFinishReason>,
}

impl Fragments {
    /// Returns why the model stopped, once the stream has completed.
    #[inline]
    pub fn finish_reason(&self) -> Option<ModelFinishReason> {
        self.finish_reason
    }

}

impl Stream for Fragments {
    type Item = Result<String, Error>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(response) = this.response.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(response.as_mut().poll_next_event(cx)) {
                Ok(Some(ModelResponseEvent::MessageDelta(delta))) => {
                    if delta.is_empty() {
                        continue;
                    }
                    trace!("got a fragment: {delta:?}");
                    return Poll::Ready(Some(Ok(delta)));
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    debug!("model finished: {reason:?}");
                    this.finish_reason = Some(reason);
                }
                Ok(None) => {
                    this.response = None;
                    return Poll::Ready(None);
                }
                Err(err) => {
                    error!("reply stream broke off: {err}");
                    this.response = None;
                    return Poll::Ready(Some(Err(
                        Error::service_unavailable().with_reason(err.to_string())
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use mindful_chat_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    fn streamer_with(
        responses: impl IntoIterator<Item = PresetResponse>,
    ) -> (ResponseStreamer, TestModelProvider) {
        let mut provider = TestModelProvider::default();
        for response in responses {
            provider.add_response(response);
        }
        let streamer =
            ResponseStreamerBuilder::with_model_provider(provider.clone())
                .build();
        (streamer, provider)
    }

    #[test]
    fn test_build_request() {
        let (streamer, _) = streamer_with([]);
        let context = [Message::user("Hi"), Message::assistant("Hello!")];
        let req = streamer.build_request(&context, "I feel anxious");

        assert_eq!(
            req.messages,
            vec![
                ModelMessage::System(DEFAULT_SYSTEM_PROMPT.trim_end().to_owned()),
                ModelMessage::User("Hi".to_owned()),
                ModelMessage::Assistant("Hello!".to_owned()),
                ModelMessage::User("I feel anxious".to_owned()),
            ]
        );
        assert_eq!(req.sampling, Sampling::default());
    }

    #[test]
    fn test_build_request_custom() {
        let provider = TestModelProvider::default();
        let streamer = ResponseStreamerBuilder::with_model_provider(provider)
            .with_system_prompt("Be brief.")
            .with_sampling(Sampling {
                temperature: 0.2,
                max_tokens: 64,
            })
            .with_context_window(4)
            .build();
        let req = streamer.build_request(&[], "Hi");

        assert_eq!(streamer.context_window(), 4);
        assert_eq!(req.messages[0], ModelMessage::System("Be brief.".to_owned()));
        assert_eq!(req.sampling.max_tokens, 64);
    }

    #[tokio::test]
    async fn test_stream_fragments() {
        let (streamer, provider) = streamer_with([
            PresetResponse::with_fragments(["I hear ", "", "you."]),
        ]);
        let mut fragments = streamer.stream(&[], "I feel anxious").await.unwrap();

        let mut collected = vec![];
        while let Some(fragment) = fragments.next().await {
            collected.push(fragment.unwrap());
        }
        assert_eq!(collected, vec!["I hear ", "you."]);
        assert_eq!(fragments.finish_reason(), Some(ModelFinishReason::Stop));
        assert!(fragments.next().await.is_none());

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].messages.last(),
            Some(&ModelMessage::User("I feel anxious".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_request_failure() {
        let (streamer, _) = streamer_with([PresetResponse::rejected()]);
        let err = streamer.stream(&[], "Hi").await.err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_mid_stream_failure() {
        let (streamer, _) = streamer_with([PresetResponse::with_fragments([
            "one ", "two ", "three",
        ])
        .failing_after(2)]);
        let mut fragments = streamer.stream(&[], "Hi").await.unwrap();

        assert_eq!(fragments.next().await.unwrap().unwrap(), "one ");
        assert_eq!(fragments.next().await.unwrap().unwrap(), "two ");
        let err = fragments.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ServiceUnavailable);
        assert!(fragments.next().await.is_none());
    }
}
