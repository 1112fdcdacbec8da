use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;
use feed_engine::LiveFeed;
use feed_ingest::FeedListener;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("crashmap-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, feed = %config.feed_url, "loaded config");

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Live feed ---
    let feed = Arc::new(LiveFeed::new(config.capacity)?);
    tracing::info!(capacity = config.capacity, "live feed created");

    // --- Feed listener: connect is explicit, startup failure is fatal ---
    let listener = FeedListener::connect(&config.feed_url).await?;
    let listener_handle = listener.spawn(feed.clone(), token.clone());

    // --- Dashboard API ---
    let api_feed = feed.clone();
    let api_token = token.clone();
    let (api_port, ws_buffer, ws_overflow) =
        (config.api_port, config.ws_buffer, config.ws_overflow);
    let mut api_handle = tokio::spawn(async move {
        dashboard_api::run(api_port, api_feed, ws_buffer, ws_overflow, api_token).await
    });

    // --- Wait for ctrl-c or early api failure ---
    tokio::select! {
        sig = tokio::signal::ctrl_c() => {
            sig?;
            tracing::info!("shutdown signal received");
            token.cancel();
        }
        res = &mut api_handle => {
            token.cancel();
            let _ = listener_handle.await;
            return match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServerError::Api(e)),
                Err(e) => Err(ServerError::Api(format!("api task: {e}"))),
            };
        }
    }

    let _ = listener_handle.await;
    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(ServerError::Api(e)),
        Err(e) => return Err(ServerError::Api(format!("api task: {e}"))),
    }

    tracing::info!("crashmap-server stopped");
    Ok(())
}
