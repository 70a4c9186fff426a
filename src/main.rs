use anyhow::Result;
use clap::Parser;
use shrinkzip::cli::Cli;
use shrinkzip::job::run_job;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shrinkzip={}", cli.log_level())));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = cli.validate() {
        e.exit();
    }

    let job = cli.job_config()?;
    if let Err(e) = run_job(job).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
