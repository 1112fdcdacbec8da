use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::GenArgs;
use crate::domain::{CsvReader, Rng, Synth};
use crate::error::GenError;

// ═══════════════════════════════════════════════════════════════
//  Feed server: generator task → broadcast → ws clients
// ═══════════════════════════════════════════════════════════════

#[derive(Clone)]
struct FeedState {
    tx: broadcast::Sender<String>,
}

pub async fn run(args: &GenArgs) -> Result<(), GenError> {
    if args.rps <= 0.0 {
        return Err(GenError::Config("--rps must be positive".into()));
    }

    let mut reader = match &args.file {
        Some(path) => {
            let r = CsvReader::open(path)?;
            tracing::info!(file = %r.path, rows = r.total(), "replaying historical crashes");
            Some(r)
        }
        None => None,
    };

    let (tx, _) = broadcast::channel::<String>(1024);
    let token = CancellationToken::new();

    // --- Generator task ---
    let gen_tx = tx.clone();
    let gen_token = token.clone();
    let interval = std::time::Duration::from_secs_f64(1.0 / args.rps);
    let seed = args.seed;
    let gen_handle = tokio::spawn(async move {
        let mut rng = Rng::new(seed);
        let mut synth = Synth::new(seed);
        let mut id: u64 = 0;
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = gen_token.cancelled() => break,
                _ = ticker.tick() => {
                    let payload = match reader.as_mut() {
                        Some(r) => {
                            id += 1;
                            match r.next_payload(id, &mut rng) {
                                Some(p) => p,
                                None => {
                                    tracing::info!("file exhausted, feed idle");
                                    break;
                                }
                            }
                        }
                        None => synth.next(),
                    };
                    // нет подключённых клиентов — не ошибка
                    let _ = gen_tx.send(payload.to_string());
                }
            }
        }
    });

    // --- WS endpoint ---
    let state = FeedState { tx };
    let app = Router::new().route("/ws", get(handle_ws)).with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    tracing::info!(port = args.port, rps = args.rps, "crash feed listening");

    let serve_token = token.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(serve_token.cancelled_owned())
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    token.cancel();

    let _ = gen_handle.await;
    match server_handle.await {
        Ok(res) => res?,
        Err(e) => return Err(GenError::Serve(format!("server task: {e}"))),
    }

    Ok(())
}

async fn handle_ws(State(state): State<FeedState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let rx = state.tx.subscribe();
    ws.on_upgrade(move |socket| ws_connection(socket, rx))
}

async fn ws_connection(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                }
            }

            payload = rx.recv() => {
                match payload {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "slow feed client lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
