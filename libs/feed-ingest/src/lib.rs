pub mod error;

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use feed_api::{CrashRecord, ErrorKind, FeedEntry};
use feed_engine::LiveFeed;

pub use error::IngestError;

// ═══════════════════════════════════════════════════════════════
//  FeedListener — ws client → LiveFeed
// ═══════════════════════════════════════════════════════════════

/// Явно владеемое подключение к upstream-потоку крушений.
///
/// Lifecycle явный: [`FeedListener::connect`] открывает соединение
/// (ошибка — сразу наружу), [`FeedListener::spawn`] запускает read
/// loop, cancel token закрывает сокет. Reconnect не делаем.
#[derive(Debug)]
pub struct FeedListener {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl FeedListener {
    /// Открыть соединение к `url` (`ws://…` / `wss://…`).
    pub async fn connect(url: &str) -> Result<Self, IngestError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| IngestError::Connect {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        tracing::info!(%url, "feed connected");
        Ok(Self {
            url: url.to_string(),
            stream,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Запустить read loop как задачу. Завершается при Close-фрейме,
    /// transport-ошибке или отмене token'а.
    pub fn spawn(self, feed: Arc<LiveFeed>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let url = self.url.clone();
            if let Err(e) = self.run(&feed, token).await {
                tracing::error!(%url, error = %e, "feed listener failed");
            }
        })
    }

    async fn run(
        mut self,
        feed: &LiveFeed,
        token: CancellationToken,
    ) -> Result<(), IngestError> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = self.stream.close(None).await;
                    tracing::info!(url = %self.url, "feed listener cancelled");
                    return Ok(());
                }

                msg = self.stream.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            return Err(IngestError::Transport(e.to_string()));
                        }
                        None => {
                            tracing::info!(url = %self.url, "feed closed");
                            return Ok(());
                        }
                    };

                    match msg {
                        Message::Text(text) => handle_frame(feed, text.as_str()).await,
                        Message::Close(_) => {
                            tracing::info!(url = %self.url, "feed sent close");
                            return Ok(());
                        }
                        // ping/pong отвечает tungstenite, binary игнорируем
                        _ => continue,
                    }
                }
            }
        }
    }
}

/// Обработать один текстовый фрейм: parse → publish.
///
/// Malformed payload дропается с warn-логом (решение по open
/// question спорного поведения референса: drop-and-log), состояние
/// feed'а при этом не меняется.
async fn handle_frame(feed: &LiveFeed, text: &str) {
    match CrashRecord::parse(text) {
        Ok(record) => {
            feed.publish(FeedEntry::new(record)).await;
        }
        Err(e) if e.kind() == ErrorKind::Format => {
            tracing::warn!(error = ?e, "bad payload, skipping");
        }
        Err(e) => {
            tracing::error!(error = ?e, "unexpected payload error, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;

    async fn ws_feed_server(
        frames: Vec<&'static str>,
    ) -> (std::net::SocketAddr, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            ws.close(None).await.unwrap();
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn valid_frames_land_in_feed_in_order() {
        let (addr, server) = ws_feed_server(vec![
            r#"{"locationGPS":{"lon":10,"lat":20},"id":1}"#,
            r#"{"locationGPS":{"lon":30,"lat":40},"id":2}"#,
        ])
        .await;

        let feed = Arc::new(LiveFeed::new(10).unwrap());
        let token = CancellationToken::new();
        let listener = FeedListener::connect(&format!("ws://{addr}")).await.unwrap();
        listener.spawn(feed.clone(), token).await.unwrap();
        server.await.unwrap();

        let snap = feed.snapshot().await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].record.value()["id"], 1);
        assert_eq!(snap[0].marker.lng, 10.0);
        assert_eq!(snap[1].record.value()["id"], 2);
        assert_eq!(snap[1].marker.lat, 40.0);
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let (addr, server) = ws_feed_server(vec![
            r#"{"locationGPS":{"lon":1,"lat":2},"id":1}"#,
            "not json at all",
            r#"{"id":3}"#,
            r#"{"locationGPS":{"lon":"x","lat":2},"id":4}"#,
            r#"{"locationGPS":{"lon":5,"lat":6},"id":5}"#,
        ])
        .await;

        let feed = Arc::new(LiveFeed::new(10).unwrap());
        let token = CancellationToken::new();
        let listener = FeedListener::connect(&format!("ws://{addr}")).await.unwrap();
        listener.spawn(feed.clone(), token).await.unwrap();
        server.await.unwrap();

        let records = feed.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value()["id"], 1);
        assert_eq!(records[1].value()["id"], 5);
    }

    #[tokio::test]
    async fn connect_failure_is_named_error() {
        // закрытый порт
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = FeedListener::connect(&format!("ws://{addr}")).await.unwrap_err();
        assert!(matches!(err, IngestError::Connect { .. }));
    }

    #[tokio::test]
    async fn cancellation_stops_listener() {
        let listener_sock = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener_sock.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener_sock.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"locationGPS":{"lon":1,"lat":2},"id":1}"#.into(),
            ))
            .await
            .unwrap();
            // держим соединение, пока клиент не закроется
            while let Some(Ok(_)) = ws.next().await {}
        });

        let feed = Arc::new(LiveFeed::new(10).unwrap());
        let token = CancellationToken::new();
        let listener = FeedListener::connect(&format!("ws://{addr}")).await.unwrap();
        let handle = listener.spawn(feed.clone(), token.clone());

        // дождаться первой записи, потом отменить
        let mut sub = feed.subscribe(4, feed_api::OverflowPolicy::Drop).await;
        if feed.is_empty().await {
            let _ = sub.recv().await;
        }
        token.cancel();
        handle.await.unwrap();
        server.await.unwrap();
        assert_eq!(feed.len().await, 1);
    }
}
