use async_trait::async_trait;
use model_gateway::{
    companion::{GatewayServerBuilder, MethodResult, RemoteObject},
    config::GatewayConfig,
    logger,
    rpc::{Argument, ReturnValue},
};

pub struct Greeter;

#[async_trait]
impl RemoteObject for Greeter {
    async fn call(&self, method: &str, args: &[Argument]) -> MethodResult {
        match (method, args) {
            ("sayHello", []) => Ok(ReturnValue::Text("Hello from the model companion".into())),
            ("printHello", []) => {
                println!("Hello printed on the companion side");
                Ok(ReturnValue::Void)
            }
            _ => Err(format!("Method {method} with {} argument(s) does not exist", args.len())),
        }
    }
}

/// Placeholder for the simulation: a fixed twelve-step decay curve scaled by
/// the parameter.
pub struct StubModel;

#[async_trait]
impl RemoteObject for StubModel {
    async fn call(&self, method: &str, args: &[Argument]) -> MethodResult {
        match (method, args) {
            ("exec", []) => Ok(ReturnValue::Void),
            ("exec", [param]) => {
                let scale = param
                    .as_f64()
                    .ok_or_else(|| format!("exec expects a number, got {param:?}"))?;
                let values = (0..12).map(|t| scale * 0.9f64.powi(t)).collect();
                Ok(ReturnValue::Floats(values))
            }
            _ => Err(format!("Method {method} with {} argument(s) does not exist", args.len())),
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    logger::setup_logger();

    let config = GatewayConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let server = GatewayServerBuilder::new(Greeter)
        .add_static("housing.Model", StubModel)
        .bind(&config.endpoint)
        .await?;
    log::info!("Companion gateway listening on {}", server.endpoint()?);

    tokio::select! {
        res = server.serve() => res,
        res = tokio::signal::ctrl_c() => {
            log::info!("Companion shutting down...");
            res
        }
    }
}
