//! CLI binary for phasesim.
//!
//! A thin shim over the library crate: maps CLI flags to `ProcessorConfig`,
//! drives one `Submission` through select → process, and writes the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use phasesim::{
    decode_data_uri, DecodedImage, ErrorCategory, Phase, ProcessorConfig, SelectedFile,
    StateObserver, StateSnapshot, Status, Submission, SubmissionError,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Shows a spinner for as long as the session reports `loading`.
struct CliObserver {
    spinner: Mutex<SpinnerState>,
}

#[derive(Default)]
struct SpinnerState {
    bar: Option<(ProgressBar, Instant)>,
    revision: u64,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(SpinnerState::default()),
        })
    }

    fn start(phase: Phase, file: &str) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Processing");
        bar.set_message(format!("{file} ({phase})"));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }
}

impl StateObserver for CliObserver {
    fn on_state_change(&self, snapshot: &StateSnapshot) {
        let mut spinner = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        // late delivery from an overlapping intent
        if snapshot.revision < spinner.revision {
            return;
        }
        spinner.revision = snapshot.revision;

        match (snapshot.loading, spinner.bar.is_some()) {
            (true, false) => {
                let file = snapshot.file_name.as_deref().unwrap_or("image");
                spinner.bar = Some((Self::start(snapshot.phase, file), Instant::now()));
            }
            (false, true) => {
                if let Some((bar, started)) = spinner.bar.take() {
                    bar.finish_and_clear();
                    let secs = dim(&format!("{:.1}s", started.elapsed().as_secs_f64()));
                    match snapshot.status {
                        Status::Completed => {
                            eprintln!("{} Processing completed  {}", green("✔"), secs)
                        }
                        _ => eprintln!("{} Processing stopped  {}", red("✘"), secs),
                    }
                }
            }
            _ => {}
        }
    }

    fn on_superseded(&self, generation: u64) {
        eprintln!("{}", dim(&format!("discarded stale result #{generation}")));
    }
}

/// Largest `--max-size-mb` whose byte count still fits in a `u64`.
const MAX_SIZE_MB: u64 = u64::MAX >> 20;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Arterial phase (default), processed image as a data URI on stdout
  phasesim scan.png

  # Venous phase, write the processed image to a file
  phasesim --phase venous scan.png -o scan-venous.png

  # Local service with a 60 s timeout and a JSON summary
  phasesim --base-url http://localhost:7860 --timeout 60 --json scan.jpg

ENVIRONMENT VARIABLES:
  PHASESIM_BASE_URL       Processing service base URL
  PHASESIM_PHASE          Default phase (arterial, venous)
  PHASESIM_TIMEOUT        Request timeout in seconds
  RUST_LOG                Log filter override (e.g. phasesim=debug)
"#;

/// Submit a medical image for remote arterial/venous phase simulation.
#[derive(Parser, Debug)]
#[command(
    name = "phasesim",
    version,
    about = "Submit a medical image for remote arterial/venous phase simulation",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file to submit (JPG, PNG, …).
    image: PathBuf,

    /// Acquisition phase to simulate.
    #[arg(long, env = "PHASESIM_PHASE", value_enum, default_value = "arterial")]
    phase: PhaseArg,

    /// Processing service base URL; requests go to {base_url}/process.
    #[arg(long, env = "PHASESIM_BASE_URL", default_value = phasesim::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Write the processed image to this file instead of printing its data URI.
    #[arg(short, long, env = "PHASESIM_OUTPUT")]
    output: Option<PathBuf>,

    /// Request timeout in seconds. Unset means no timeout beyond the transport default.
    #[arg(long, env = "PHASESIM_TIMEOUT")]
    timeout: Option<u64>,

    /// Maximum accepted file size in MiB.
    #[arg(long, env = "PHASESIM_MAX_SIZE_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..=MAX_SIZE_MB))]
    max_size_mb: u64,

    /// Print a JSON summary instead of the data URI.
    #[arg(long, env = "PHASESIM_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "PHASESIM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PHASESIM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PHASESIM_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PhaseArg {
    Arterial,
    Venous,
}

impl From<PhaseArg> for Phase {
    fn from(v: PhaseArg) -> Self {
        match v {
            PhaseArg::Arterial => Phase::Arterial,
            PhaseArg::Venous => Phase::Venous,
        }
    }
}

/// Machine-readable run summary for `--json`.
#[derive(Serialize)]
struct Summary<'a> {
    file: String,
    phase: Phase,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_category: Option<ErrorCategory>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports progress; keep INFO logs out of its way.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build session ────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let mut submission =
        Submission::with_http(config).context("Failed to set up the processing client")?;
    if show_progress {
        submission = submission.with_observer(CliObserver::new());
    }

    // ── Select → process ─────────────────────────────────────────────────
    let file = SelectedFile::from_path(&cli.image)
        .await
        .context("Cannot open image")?;

    let attempt = match submission.select_file(file).await {
        Ok(_) => submission.process().await,
        Err(e) => Err(e),
    };
    let snapshot = submission.snapshot();

    let decoded = match snapshot.result.as_deref() {
        Some(uri) if attempt.is_ok() => Some(decode_data_uri(uri)),
        _ => None,
    };

    // ── Output ───────────────────────────────────────────────────────────
    if let (Some(path), Some(Ok(image))) = (&cli.output, &decoded) {
        write_atomic(path, &image.bytes).await?;
        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  {}  {}  →  {}",
                green("✔"),
                snapshot.phase,
                dim(&format!("{} bytes {}", image.bytes.len(), image.media_type)),
                bold(&path.display().to_string()),
            );
        }
    }

    if cli.json {
        let summary = Summary {
            file: cli.image.display().to_string(),
            phase: snapshot.phase,
            status: snapshot.status,
            output: written_output(cli.output.as_deref(), decoded.as_ref()),
            result_media_type: decoded
                .as_ref()
                .and_then(|d| d.as_ref().ok())
                .map(|d| d.media_type.clone()),
            result_bytes: decoded
                .as_ref()
                .and_then(|d| d.as_ref().ok())
                .map(|d| d.bytes.len()),
            error: snapshot.error_message(),
            error_category: snapshot.error_category(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if cli.output.is_none() {
        if let Some(uri) = snapshot.result.as_deref() {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{uri}").context("Failed to write to stdout")?;
        }
    }

    attempt.context("Processing failed")?;
    if cli.output.is_some() {
        if let Some(Err(e)) = decoded {
            return Err(e).context("Processed image could not be decoded");
        }
    }

    Ok(())
}

/// The output path, if the processed image was actually written there.
fn written_output<'a>(
    output: Option<&'a Path>,
    decoded: Option<&Result<DecodedImage, SubmissionError>>,
) -> Option<&'a Path> {
    output.filter(|_| matches!(decoded, Some(Ok(_))))
}

/// Map CLI args to `ProcessorConfig`.
fn build_config(cli: &Cli) -> Result<ProcessorConfig> {
    let max_file_bytes = cli
        .max_size_mb
        .checked_mul(1024 * 1024)
        .with_context(|| format!("--max-size-mb {} is too large", cli.max_size_mb))?;

    let mut builder = ProcessorConfig::builder()
        .base_url(cli.base_url.clone())
        .max_file_bytes(max_file_bytes)
        .default_phase(cli.phase.into());

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}

/// Write `bytes` to `path` via a temporary sibling file and rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("part");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
