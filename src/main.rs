use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use privat_rates::{Cli, PrivatBank, run};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let args = Cli::parse();
    let source = PrivatBank::new(args.base_url.as_str());
    let today = jiff::Zoned::now().date();

    let mut stdout = io::stdout().lock();
    let result = run(&args, &source, today, &mut stdout).and_then(|()| Ok(stdout.flush()?));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "run failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
