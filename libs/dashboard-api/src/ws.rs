use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;

use feed_api::{CrashRecord, FeedEntry, Marker};

use crate::AppState;

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws — live push к дашборд-клиентам
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(socket, state))
}

#[derive(serde::Serialize)]
struct WsSnapshot {
    r#type: &'static str,
    records: Vec<CrashRecord>,
    markers: Vec<Marker>,
}

#[derive(serde::Serialize)]
struct WsEntry<'a> {
    r#type: &'static str,
    entry: &'a FeedEntry,
}

/// Протокол: при подключении — `snapshot` текущего состояния,
/// дальше по одному `entry` на каждую опубликованную запись.
/// Подписка оформляется до снятия snapshot'а, чтобы не потерять
/// записи между ними (возможен дубль, но не пропуск).
async fn ws_connection(mut socket: WebSocket, state: AppState) {
    let mut sub = state.feed.subscribe(state.ws_buffer, state.ws_overflow).await;

    let snapshot = state.feed.snapshot().await;
    let mut records = Vec::with_capacity(snapshot.len());
    let mut markers = Vec::with_capacity(snapshot.len());
    for entry in snapshot {
        records.push(entry.record);
        markers.push(entry.marker);
    }
    let snap = WsSnapshot {
        r#type: "snapshot",
        records,
        markers,
    };
    if let Ok(json) = serde_json::to_string(&snap) {
        if socket.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            biased;

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // входящие сообщения клиентов не интерпретируем
                    Some(Ok(_)) => continue,
                }
            }

            entry = sub.recv() => {
                match entry {
                    Some(entry) => {
                        let msg = WsEntry {
                            r#type: "entry",
                            entry: &entry,
                        };
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }
}
