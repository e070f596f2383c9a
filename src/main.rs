use anyhow::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(pulsar::DEFAULT_LOG_FILTER),
    )
    .init();
    log::info!("pulsar {}", env!("CARGO_PKG_VERSION"));

    let preset = std::env::args().nth(1);
    pulsar::repl::start(preset.as_deref())
}
