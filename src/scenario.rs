//! The two call sequences the model scripts perform against a running
//! companion. They are kept apart on purpose: one runs the simulation with an
//! explicit parameter and prints every value, the other runs it with the
//! model's defaults and ignores the result.

use std::io::Write;

use crate::{
    client::{Call, GatewayConnection, render},
    error::{GatewayError, Result},
};

pub const GREETING_METHOD: &str = "sayHello";
pub const PRINT_METHOD: &str = "printHello";
pub const MODEL_PATH: &str = "housing.Model";
pub const EXEC_METHOD: &str = "exec";

/// Parameter passed to `housing.Model.exec` by the full scenario.
pub const EXEC_PARAMETER: f64 = 1.5;

/// Greeting, then the print-only call, then `exec(1.5)`; each result is
/// rendered to `out` before the next call goes out. Stops at the first error.
pub async fn run_full<W: Write>(conn: &mut GatewayConnection, out: &mut W) -> Result<()> {
    let greeting = conn.invoke(Call::bound(GREETING_METHOD, vec![])).await?;
    render(&greeting, out).map_err(GatewayError::Output)?;

    // Output of this one appears on the companion's console.
    let printed = conn.invoke(Call::bound(PRINT_METHOD, vec![])).await?;
    render(&printed, out).map_err(GatewayError::Output)?;

    let result = conn
        .invoke(Call::on_static(
            MODEL_PATH,
            EXEC_METHOD,
            vec![EXEC_PARAMETER.into()],
        ))
        .await?;
    log::debug!("{MODEL_PATH}.{EXEC_METHOD} returned {}", result.kind());
    render(&result, out).map_err(GatewayError::Output)?;

    Ok(())
}

/// `exec()` with no arguments; whatever comes back is dropped.
pub async fn run_default_exec(conn: &mut GatewayConnection) -> Result<()> {
    let result = conn
        .invoke(Call::on_static(MODEL_PATH, EXEC_METHOD, vec![]))
        .await?;
    log::debug!("{MODEL_PATH}.{EXEC_METHOD}() returned {}", result.kind());
    Ok(())
}
