use anyhow::Result;
use node_admin::cli::{start, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;

    let result = action.execute().await;

    // flush spans before exit, also on error
    telemetry::shutdown_tracer();

    result
}
