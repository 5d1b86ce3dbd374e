use clap::Parser;
use models::AppConfig;
use sharebox::config::CliConfig;
use sharebox::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg: AppConfig = CliConfig::parse().into_app_config();

    let engine = Engine::new(cfg)?;
    engine.run().await
}
