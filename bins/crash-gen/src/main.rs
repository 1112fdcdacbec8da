mod config;
mod domain;
mod error;
mod serve;

use clap::Parser;
use config::GenArgs;

#[derive(Parser)]
#[command(name = "crash-gen", about = "Генератор потока крушений (ws feed)")]
struct Cli {
    #[command(flatten)]
    args: GenArgs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = serve::run(&cli.args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
