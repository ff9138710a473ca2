//! cvp-run - run an enhancement pipeline on a local file
//!
//! Usage:
//! ```text
//! cvp-run noisy.mp3 clean.wav
//! cvp-run in.wav out.wav --step speech_enhancement:FRCRN_SE_16K --keep-intermediates
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cvp_common::config::load_toml_config;
use cvp_common::{default_pipeline, ModelRegistry, PipelineStep};
use tokio_util::sync::CancellationToken;
use tracing::info;

use cvp_enhance::model::ClearVoiceCli;
use cvp_enhance::pipeline::{PipelineRunner, RunOptions, ScratchArea};
use cvp_enhance::source::{AudioSource, SourceResolver};

#[derive(Parser, Debug)]
#[command(name = "cvp-run")]
#[command(about = "Run a speech enhancement pipeline on a local audio file")]
#[command(version)]
struct Args {
    /// Input audio file (any format symphonia can decode)
    input: PathBuf,

    /// Output WAV file
    output: PathBuf,

    /// Pipeline step as <task>:<model>, repeatable (default pipeline if omitted)
    #[arg(short, long = "step", value_name = "TASK:MODEL")]
    steps: Vec<PipelineStep>,

    /// TOML config file
    #[arg(short, long, env = "CVP_CONFIG")]
    config: Option<PathBuf>,

    /// Scratch root (defaults to the configured scratch directory)
    #[arg(long)]
    scratch: Option<PathBuf>,

    /// Keep intermediate files
    #[arg(long)]
    keep_intermediates: bool,

    /// Python interpreter with the clearvoice package
    #[arg(long, env = "CVP_PYTHON")]
    python: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    let steps = if args.steps.is_empty() {
        default_pipeline()
    } else {
        args.steps
    };

    let python = args.python.unwrap_or_else(|| config.python.clone());
    let registry = Arc::new(ModelRegistry::with_extra(config.models.clone()));
    let runner = PipelineRunner::new(registry, Arc::new(ClearVoiceCli::new(python)));
    runner.validate(&steps).context("Invalid pipeline")?;

    let request_id = uuid::Uuid::new_v4();
    let scratch_root = args.scratch.unwrap_or_else(|| config.scratch_dir());
    let scratch = ScratchArea::create(&scratch_root, request_id, args.keep_intermediates)
        .with_context(|| format!("Failed to create scratch area in {}", scratch_root.display()))?;

    let resolver = SourceResolver::new(
        std::env::current_dir().context("Failed to read working directory")?,
        std::time::Duration::from_secs(config.download_timeout_secs),
        config.max_download_bytes,
    )?
    .allow_any_path();
    let resolved = resolver
        .resolve(&AudioSource::File(args.input.clone()), &scratch.path().join("input"))
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, stopping after the current step");
                cancel.cancel();
            }
        })
    };

    let outcome = {
        let input = resolved.path.clone();
        let output = args.output.clone();
        let work_dir = scratch.path().join("steps");
        let options = RunOptions {
            retain_intermediates: args.keep_intermediates,
        };
        let steps = steps.clone();
        tokio::task::spawn_blocking(move || {
            runner.run(&input, &steps, &work_dir, &output, &options, &cancel)
        })
        .await
        .context("Pipeline task panicked")??
    };
    ctrl_c.abort();

    for (i, path) in outcome.intermediates.iter().enumerate() {
        info!("Step {} ({}): {}", i + 1, steps[i], path.display());
    }
    info!(
        "Final enhanced audio saved to {} ({:.1}s)",
        outcome.output.display(),
        outcome.elapsed.as_secs_f64()
    );

    Ok(())
}
