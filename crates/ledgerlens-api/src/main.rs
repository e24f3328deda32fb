use ledgerlens_api::setup;
use ledgerlens_core::IntakeConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = IntakeConfig::from_env()?;
    let app = setup::initialize_app(config.clone()).await?;
    setup::server::start_server(&config, app).await
}
