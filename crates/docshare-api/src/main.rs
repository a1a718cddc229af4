use docshare_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Validate, initialize telemetry, seed identities and build routes
    let (_state, router) = docshare_api::setup::initialize_app(config.clone()).await?;

    docshare_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
