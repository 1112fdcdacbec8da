use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect};
use serde::{Deserialize, Serialize};

use feed_api::{CrashRecord, Marker};

use crate::nav::{self, NavItem};
use crate::AppState;

// ═══════════════════════════════════════════════════════════════
//  View: GET /crashes
// ═══════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct DashboardView {
    nav: Vec<NavItem>,
    records: Vec<CrashRecord>,
    markers: Vec<Marker>,
}

pub(crate) async fn handle_crashes(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.feed.snapshot().await;
    let mut records = Vec::with_capacity(snapshot.len());
    let mut markers = Vec::with_capacity(snapshot.len());
    for entry in snapshot {
        records.push(entry.record);
        markers.push(entry.marker);
    }

    axum::Json(DashboardView {
        nav: nav::menu(nav::CRASHES_PATH),
        records,
        markers,
    })
}

// ═══════════════════════════════════════════════════════════════
//  Fallback — redirect to the single view
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_redirect() -> Redirect {
    Redirect::to(nav::CRASHES_PATH)
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/crashes, GET /api/markers
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct TailParams {
    limit: Option<usize>,
}

/// Оставить хвост из `limit` самых свежих элементов.
fn tail<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        if limit < items.len() {
            items.drain(..items.len() - limit);
        }
    }
    items
}

pub(crate) async fn handle_records(
    State(state): State<AppState>,
    Query(params): Query<TailParams>,
) -> impl IntoResponse {
    let records = tail(state.feed.records().await, params.limit);
    axum::Json(records)
}

pub(crate) async fn handle_markers(
    State(state): State<AppState>,
    Query(params): Query<TailParams>,
) -> impl IntoResponse {
    let markers = tail(state.feed.markers().await, params.limit);
    axum::Json(markers)
}

// ═══════════════════════════════════════════════════════════════
//  Service endpoints
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_healthz() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct VersionInfo {
    version: &'static str,
}

pub(crate) async fn handle_version() -> impl IntoResponse {
    axum::Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::util::ServiceExt;

    use feed_api::{CrashRecord, FeedEntry, OverflowPolicy};
    use feed_engine::LiveFeed;

    async fn feed_with(ids: &[u64]) -> Arc<LiveFeed> {
        let feed = Arc::new(LiveFeed::new(300).unwrap());
        for id in ids {
            let text = format!(
                r#"{{"locationGPS":{{"lon":{id}.5,"lat":-{id}.5}},"id":{id}}}"#
            );
            feed.publish(FeedEntry::new(CrashRecord::parse(&text).unwrap()))
                .await;
        }
        feed
    }

    fn app(feed: Arc<LiveFeed>) -> axum::Router {
        crate::router(feed, 16, OverflowPolicy::Drop)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unmatched_path_redirects_to_crashes() {
        let app = app(feed_with(&[]).await);
        let response = app
            .oneshot(Request::get("/somewhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/crashes");
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = app(feed_with(&[]).await);
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn version_reports_crate_version() {
        let app = app(feed_with(&[]).await);
        let response = app
            .oneshot(Request::get("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn crashes_view_has_nav_records_markers() {
        let app = app(feed_with(&[1, 2]).await);
        let response = app
            .oneshot(Request::get("/crashes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["nav"][0]["path"], "/crashes");
        assert_eq!(json["nav"][0]["active"], true);
        assert_eq!(json["records"].as_array().unwrap().len(), 2);
        assert_eq!(json["markers"].as_array().unwrap().len(), 2);
        assert_eq!(json["records"][0]["id"], 1);
        assert_eq!(json["markers"][1]["lng"], 2.5);
    }

    #[tokio::test]
    async fn api_crashes_returns_records() {
        let app = app(feed_with(&[1, 2, 3]).await);
        let response = app
            .oneshot(Request::get("/api/crashes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["id"], 3);
    }

    #[tokio::test]
    async fn limit_keeps_most_recent_tail() {
        let app = app(feed_with(&[1, 2, 3, 4]).await);
        let response = app
            .oneshot(
                Request::get("/api/markers?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        let markers = json.as_array().unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0]["lng"], 3.5);
        assert_eq!(markers[1]["lng"], 4.5);
    }
}
