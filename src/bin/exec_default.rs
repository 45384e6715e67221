use std::process::ExitCode;

use model_gateway::{client::GatewayConnection, config::GatewayConfig, error::Result, logger, scenario};

async fn run() -> Result<()> {
    let config = GatewayConfig::from_env()?;
    let mut conn = GatewayConnection::connect(&config).await?;
    scenario::run_default_exec(&mut conn).await?;
    conn.close().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logger::setup_logger();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
