#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("websocket connect '{url}': {detail}")]
    Connect { url: String, detail: String },

    #[error("websocket: {0}")]
    Transport(String),
}
