use tracing::error;

use visit_report_module::{AppConfig, Runner};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    if let Err(err) = run() {
        error!("visit plan run failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let runner = Runner::from_config(config)?;
    runner.run()?;
    Ok(())
}
