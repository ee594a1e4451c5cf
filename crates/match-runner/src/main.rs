//! `directorctl`: the multi-camera football director pipeline CLI (§6.6).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use directorctl::cli::{run_report_command, run_run_command, run_validate_command};
use directorctl::init_tracing;
use match_director::CancellationToken;

#[derive(Parser)]
#[command(name = "directorctl", about = "Multi-camera football highlight director pipeline", version)]
struct Cli {
    /// Raise the tracing filter to debug for this pipeline's own modules.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit structured JSON logs instead of human-readable ANSI, for
    /// production log aggregation.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full match to a finished highlight file plus a JSON report.
    Run {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Override the configured highlight duration, in seconds.
        #[arg(long)]
        duration: Option<f64>,
        /// Override the output frame rate.
        #[arg(long)]
        fps: Option<f64>,
    },
    /// Load and validate configuration only; print the resolved config and exit.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Pretty-print a previously written JSON run report.
    Report {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        report: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs, cli.verbose);

    let result = match cli.command {
        Command::Run { config, out, duration, fps } => run(config, out, duration, fps).await,
        Command::Validate { config } => validate(&config),
        Command::Report { config, report } => report_cmd(&config, &report),
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run(config: PathBuf, out: PathBuf, duration: Option<f64>, fps: Option<f64>) -> directorctl::RunnerResult<()> {
    // `--out` overrides `output_path` from the config file so a single
    // config can be reused against multiple destinations.
    std::env::set_var("DIRECTOR_OUTPUT_PATH", out.as_os_str());

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, cancelling at next tick boundary");
            cancel_for_signal.cancel();
        }
    });

    let report = run_run_command(&config, duration, fps, cancel).await?;
    info!(
        written = report.written,
        switches = report.switches.len(),
        duration_written_secs = report.duration_written_secs,
        "run complete"
    );
    Ok(())
}

fn validate(config: &std::path::Path) -> directorctl::RunnerResult<()> {
    let resolved = run_validate_command(config)?;
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    info!("configuration is valid");
    Ok(())
}

fn report_cmd(_config: &std::path::Path, report: &std::path::Path) -> directorctl::RunnerResult<()> {
    let resolved = run_report_command(report)?;
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}
