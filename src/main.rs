//! Headless capture runner: stream, select, crop, report.

use roicam_lib::logging::init_logging;
use roicam_lib::{run, AppError, RunArgs};
use tracing::info;

fn main() -> Result<(), AppError> {
    init_logging()?;
    info!("=== roicam v{} ===", env!("CARGO_PKG_VERSION"));

    let args = RunArgs::parse(std::env::args().skip(1))?;
    let report = run(&args)?;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("failed to serialise run report: {e}"),
    }
    Ok(())
}
