mod http;
pub mod nav;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use feed_api::OverflowPolicy;
use feed_engine::LiveFeed;

pub use nav::{NavItem, is_active, menu};

#[derive(Clone)]
struct AppState {
    feed: Arc<LiveFeed>,
    ws_buffer: usize,
    ws_overflow: OverflowPolicy,
}

/// Собрать Router дашборда.
///
/// Один зарегистрированный view — `/crashes`; все прочие пути
/// редиректятся на него.
pub fn router(feed: Arc<LiveFeed>, ws_buffer: usize, ws_overflow: OverflowPolicy) -> Router {
    let state = AppState {
        feed,
        ws_buffer,
        ws_overflow,
    };

    Router::new()
        .route("/crashes", get(http::handle_crashes))
        .route("/api/crashes", get(http::handle_records))
        .route("/api/markers", get(http::handle_markers))
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(http::handle_healthz))
        .route("/version", get(http::handle_version))
        .fallback(http::handle_redirect)
        .with_state(state)
}

/// HTTP + WebSocket сервер дашборда.
pub async fn run(
    port: u16,
    feed: Arc<LiveFeed>,
    ws_buffer: usize,
    ws_overflow: OverflowPolicy,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(feed, ws_buffer, ws_overflow);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;

    tracing::info!(port, "dashboard api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
