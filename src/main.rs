use anyhow::Context;
use tracing_subscriber::util::SubscriberInitExt;
use waitlist::{app::App, config::get_configuration, store, telemetry::get_subscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration().context("Failed to read configuration.")?;

    get_subscriber(&config.log_level, std::io::stderr).init();

    let store = store::connect(&config).await?;
    let app = App::with(config).await?;

    tracing::info!(host = %app.host()?, port = app.port()?, "starting server");
    app.serve(store)
        .await
        .context("The server stopped unexpectedly")?;

    Ok(())
}
