use clap::Args;

#[derive(Args, Clone, Debug)]
pub struct GenArgs {
    /// Порт ws-эндпоинта фида
    #[arg(long, default_value_t = 9100, env = "CRASH_GEN_PORT")]
    pub port: u16,

    /// Сообщений в секунду
    #[arg(long, default_value_t = 10.0)]
    pub rps: f64,

    /// CSV файл исторических крушений (без него — синтетика)
    #[arg(long)]
    pub file: Option<String>,

    /// Seed для PRNG (0 = текущее время)
    #[arg(long, default_value_t = 0)]
    pub seed: i64,
}
