use anyhow::Result;
use gcode_sim::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args_and_env()?;

    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .init();

    gcode_sim::cli::run(config).await
}
