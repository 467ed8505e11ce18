//! Entry point for the `ptw-analyze` command-line client.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ptw_client::{
    fingerprint::{self, Fingerprinter},
    AnalysisController, Artifact, ClientError, ControllerConfig, HttpBackend, Phase,
    Sha256Fingerprinter,
};
use tracing_subscriber::EnvFilter;

/// Submit artifacts to the PTW analysis service and wait for their reports.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Gateway origin serving the analysis API.
    #[arg(
        long,
        env = "PTW_GATEWAY_URL",
        default_value = "http://127.0.0.1:8080",
        global = true
    )]
    gateway: String,

    /// Delay between status checks, in milliseconds.
    #[arg(long, default_value_t = 2_000, global = true)]
    poll_interval_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a file, reusing an earlier analysis of identical content.
    Submit {
        file: PathBuf,
        /// Always upload, skipping the fingerprint lookup.
        #[arg(long)]
        no_dedup: bool,
    },
    /// Look up an earlier analysis by SHA-256 fingerprint.
    Search { sha256: String },
    /// List recent analyses.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "ptw-analyze failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ClientError> {
    let backend = HttpBackend::new(&cli.gateway)?;
    let config = ControllerConfig::with_poll_interval(Duration::from_millis(cli.poll_interval_ms));

    match cli.command {
        Command::History { limit } => {
            for entry in backend.history(limit).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.task_id,
                    entry.status,
                    entry.sha256.map(|fp| fp.to_string()).unwrap_or_default(),
                    entry.filename.unwrap_or_default(),
                    entry.created_at.unwrap_or_default(),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Submit { file, no_dedup } => {
            let artifact = Artifact::from_path(&file).await?;
            let fingerprinter: Arc<dyn Fingerprinter> = if no_dedup {
                Arc::new(fingerprint::Disabled)
            } else {
                Arc::new(Sha256Fingerprinter)
            };
            let controller =
                AnalysisController::spawn_with_fingerprinter(backend, fingerprinter, config);
            let session = controller.select_artifact(artifact).await?;
            let outcome = controller.wait_terminal(session).await;
            controller.shutdown().await;
            report(&outcome?)
        }
        Command::Search { sha256 } => {
            let controller = AnalysisController::spawn(backend, config);
            let session = controller.search(sha256).await?;
            let outcome = controller.wait_terminal(session).await;
            controller.shutdown().await;
            report(&outcome?)
        }
    }
}

fn report(snapshot: &ptw_client::SessionSnapshot) -> Result<ExitCode, ClientError> {
    let trail: Vec<&str> = snapshot.trail.iter().map(|p| p.as_str()).collect();
    tracing::info!(trail = %trail.join(" -> "), "session trail");

    if snapshot.phase == Phase::Completed {
        if let Some(task_id) = &snapshot.task_id {
            println!("task: {task_id}");
        }
        if let Some(fp) = &snapshot.fingerprint {
            println!("sha256: {fp}");
        }
        if let Some(report) = &snapshot.report {
            if let Some(level) = report.risk_level() {
                let verdict = if level.is_malicious() { "malicious" } else { "not flagged" };
                println!("risk: {level} ({verdict})");
            }
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
            println!("{json}");
        }
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "analysis failed: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::FAILURE)
    }
}
