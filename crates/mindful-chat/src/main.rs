//! Serves the mindful chat page.

#[macro_use]
extern crate tracing;

use mindful_chat::{
    AppState, DEFAULT_IDLE_TIMEOUT, SETUP_INSTRUCTIONS, Settings, router,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Variables from `.env` never override the ones already set.
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    match dotenv {
        Ok(path) => debug!("loaded {}", path.display()),
        Err(err) if err.not_found() => {}
        Err(err) => warn!("failed to load .env: {err}"),
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    debug!("loaded settings: {settings:?}");
    if !settings.api_key_configured() {
        warn!("{SETUP_INSTRUCTIONS}");
    }

    let addr = settings.addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to listen on {addr}: {err}");
            return;
        }
    };
    info!("listening on http://{addr}");

    let state = AppState::new(settings);
    state.sessions().spawn_sweeper(DEFAULT_IDLE_TIMEOUT);
    let app = router(state);
    if let Err(err) = axum::serve(listener, app).await {
        error!("server stopped: {err}");
    }
}
