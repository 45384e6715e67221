use std::process::ExitCode;

use model_gateway::{client::GatewayConnection, config::GatewayConfig, error::Result, logger, scenario};

async fn run() -> Result<()> {
    let config = GatewayConfig::from_env()?;
    let mut conn = GatewayConnection::connect(&config).await?;
    log::info!("Connected to gateway at {}", conn.endpoint());

    let stdout = std::io::stdout();
    scenario::run_full(&mut conn, &mut stdout.lock()).await?;
    conn.close().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logger::setup_logger();

    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    log::debug!("{name} has started v{version}...");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
