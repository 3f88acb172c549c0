use clap::Parser;
use dem_contour_cli::{run, Args, CliError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match &args.output {
        Some(path) => run_to_file(&args, path),
        None => run(&args, &mut std::io::stdout().lock()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_to_file(args: &Args, path: &Path) -> Result<(), CliError> {
    let mut out = BufWriter::new(File::create(path)?);
    run(args, &mut out)?;
    out.flush()?;
    Ok(())
}
