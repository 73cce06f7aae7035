//! HTTP routes.
//!
//! The page talks to a small JSON API. Replies are streamed back as
//! server-sent events: one `delta` per fragment, then exactly one `done`
//! or `failed` event.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mindful_chat_core::suggestion::UnknownSuggestion;
use mindful_chat_core::{
    Error, ErrorKind, Message, ResponseStreamer, ResponseStreamerBuilder,
    SessionHandle, Suggestion, Turn, TurnOutcome,
};
use mindful_chat_openai_model::OpenAIProvider;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::config::{SETUP_INSTRUCTIONS, Settings};
use crate::registry::SessionRegistry;

const INDEX_HTML: &str = include_str!("./static/index.html");

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    streamer: Option<ResponseStreamer>,
    sessions: SessionRegistry,
}

impl AppState {
    /// Creates the state, talking to the configured provider.
    ///
    /// Without an API key the state is still usable, but every message
    /// submission fails with `ConfigurationMissing`.
    pub fn new(settings: Settings) -> Self {
        let streamer = settings.openai_config().map(|config| {
            ResponseStreamerBuilder::with_model_provider(OpenAIProvider::new(
                config,
            ))
            .build()
        });
        Self::with_streamer(settings, streamer)
    }

    /// Creates the state with an explicit streamer.
    pub fn with_streamer(
        settings: Settings,
        streamer: Option<ResponseStreamer>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            streamer,
            sessions: SessionRegistry::default(),
        }
    }

    /// Returns the session registry.
    #[inline]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    fn streamer(&self) -> Result<&ResponseStreamer, ApiError> {
        self.streamer.as_ref().ok_or_else(|| {
            Error::configuration_missing()
                .with_reason(SETUP_INSTRUCTIONS)
                .into()
        })
    }

    async fn session(&self, id: &Uuid) -> Result<SessionHandle, ApiError> {
        self.sessions.get(id).await.ok_or_else(|| ApiError {
            status: StatusCode::NOT_FOUND,
            kind: "session_not_found",
            message: format!("no session with id {id}"),
        })
    }
}

/// Builds the router serving the page and the API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/sessions/{id}/suggestions/{kind}", post(suggest))
        .route("/api/sessions/{id}/messages", post(send_message))
        .with_state(state)
}

/// An error answered as `{error, kind}` JSON.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, kind) = match err.kind() {
            ErrorKind::ConfigurationMissing => {
                (StatusCode::SERVICE_UNAVAILABLE, "configuration_missing")
            }
            ErrorKind::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            ErrorKind::Busy => (StatusCode::CONFLICT, "busy"),
            ErrorKind::EmptyInput => (StatusCode::BAD_REQUEST, "empty_input"),
        };
        Self {
            status,
            kind,
            message: err.reason().into_owned(),
        }
    }
}

impl From<UnknownSuggestion> for ApiError {
    fn from(err: UnknownSuggestion) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "unknown_suggestion",
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!("answering {}: {}", self.status, self.message);
        let body = json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct StatusBody {
    api_key_configured: bool,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    setup_instructions: Option<&'static str>,
}

#[derive(Serialize)]
struct SessionBody {
    id: Uuid,
    transcript: Vec<Message>,
    busy: bool,
}

impl SessionBody {
    async fn read(id: Uuid, session: &SessionHandle) -> Self {
        let session = session.lock().await;
        Self {
            id,
            transcript: session.conversation().transcript().to_vec(),
            busy: session.is_busy(),
        }
    }
}

#[derive(Deserialize)]
struct MessageBody {
    text: String,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let configured = state.settings.api_key_configured();
    Json(StatusBody {
        api_key_configured: configured,
        model: state.settings.model().to_owned(),
        setup_instructions: (!configured).then_some(SETUP_INSTRUCTIONS),
    })
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let (id, session) = state.sessions.create().await;
    (StatusCode::CREATED, Json(SessionBody::read(id, &session).await))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionBody>, ApiError> {
    let session = state.session(&id).await?;
    Ok(Json(SessionBody::read(id, &session).await))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.session(&id).await?;
    state.sessions.remove(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionBody>, ApiError> {
    let session = state.session(&id).await?;
    session.lock().await.reset()?;
    Ok(Json(SessionBody::read(id, &session).await))
}

async fn suggest(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, String)>,
) -> Result<Json<Message>, ApiError> {
    let suggestion: Suggestion = kind.parse()?;
    let session = state.session(&id).await?;
    let msg = session.lock().await.suggest(suggestion)?;
    Ok(Json(msg))
}

enum TurnEvent {
    Delta(String),
    Done(Message),
    Failed { apology: Message, error: Error },
}

impl TurnEvent {
    fn into_sse(self) -> Result<Event, axum::Error> {
        trace!("sending event: {}", self.name());
        let event = Event::default().event(self.name());
        match self {
            TurnEvent::Delta(text) => event.json_data(json!({ "text": text })),
            TurnEvent::Done(msg) => event.json_data(msg),
            TurnEvent::Failed { apology, error } => event.json_data(json!({
                "message": apology,
                "error": error.reason(),
            })),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TurnEvent::Delta(_) => "delta",
            TurnEvent::Done(_) => "done",
            TurnEvent::Failed { .. } => "failed",
        }
    }
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageBody>,
) -> Result<Response, ApiError> {
    let streamer = state.streamer()?;
    let session = state.session(&id).await?;
    let turn = Turn::begin(&session, streamer, &body.text).await?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // A closed channel means the client is gone.
        let outcome = turn
            .run(|fragment| {
                event_tx.send(TurnEvent::Delta(fragment.to_owned())).is_ok()
            })
            .await;
        let event = match outcome {
            TurnOutcome::Completed(msg) => TurnEvent::Done(msg),
            TurnOutcome::Failed { apology, error } => {
                TurnEvent::Failed { apology, error }
            }
            TurnOutcome::Abandoned => return,
        };
        if event_tx.send(event).is_err() {
            debug!("session {id}: client left before the reply ended");
        }
    });

    let events = UnboundedReceiverStream::new(event_rx).map(TurnEvent::into_sse);
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}
