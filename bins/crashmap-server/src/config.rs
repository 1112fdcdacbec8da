use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

pub use feed_api::OverflowPolicy;

#[derive(Parser)]
#[command(name = "crashmap-server", about = "Дашборд крушений: live feed + карта")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// URL upstream-потока крушений (`ws://…` / `wss://…`).
    pub feed_url: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Ёмкость live-последовательности (записи + маркеры).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Размер буфера подписки WS клиентов на feed.
    #[serde(default = "default_ws_buffer")]
    pub ws_buffer: usize,
    /// Стратегия переполнения WS подписок.
    #[serde(default = "default_ws_overflow")]
    pub ws_overflow: OverflowPolicy,
}

fn default_api_port() -> u16 {
    9000
}
fn default_capacity() -> usize {
    300
}
fn default_ws_buffer() -> usize {
    4096
}
fn default_ws_overflow() -> OverflowPolicy {
    OverflowPolicy::Drop
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, crate::error::ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        toml::from_str(&content)
            .map_err(|e| crate::error::ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: ServerConfig = toml::from_str(r#"feed_url = "ws://localhost:9100/ws""#).unwrap();
        assert_eq!(cfg.api_port, 9000);
        assert_eq!(cfg.capacity, 300);
        assert_eq!(cfg.ws_buffer, 4096);
        assert_eq!(cfg.ws_overflow, OverflowPolicy::Drop);
    }

    #[test]
    fn overflow_accepts_snake_case() {
        let cfg: ServerConfig = toml::from_str(
            "feed_url = \"ws://x/ws\"\nws_overflow = \"back_pressure\"\ncapacity = 50\n",
        )
        .unwrap();
        assert_eq!(cfg.ws_overflow, OverflowPolicy::BackPressure);
        assert_eq!(cfg.capacity, 50);
    }

    #[test]
    fn missing_feed_url_is_an_error() {
        assert!(toml::from_str::<ServerConfig>("api_port = 9000").is_err());
    }
}
