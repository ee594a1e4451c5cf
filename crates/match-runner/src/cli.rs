//! The three `directorctl` subcommands (§6.6): `run`, `validate`, `report`.
//!
//! Each function takes already-parsed CLI arguments so `main.rs` stays a
//! thin dispatcher and these are independently testable without going
//! through `clap`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use match_director::{CancellationToken, Orchestrator};
use match_models::{DirectorConfig, FrameSink, FrameStream, RunReport};
use match_video::{BallDetectorConfig, FfmpegFrameSink, FfmpegFrameStream, OnnxBallDetector};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::logging::RunLogger;
use crate::retry::{retry_async, RetryConfig};

/// `directorctl run --config <path> --out <path> [--duration secs] [--fps f_out]`
///
/// Opens every configured camera's stream, loads the ball-detection model,
/// runs the orchestrator to completion, writes the rendered highlight to
/// `output_path`, and writes a JSON report alongside it (`<output>.report.json`).
pub async fn run_run_command(
    config_path: &Path,
    duration_override: Option<f64>,
    fps_override: Option<f64>,
    cancel: CancellationToken,
) -> RunnerResult<RunReport> {
    let mut runner_cfg = RunnerConfig::load(Some(config_path))?;
    if let Some(d) = duration_override {
        runner_cfg.director.duration_secs = d;
    }
    if let Some(f) = fps_override {
        runner_cfg.director.f_out_fallback = f;
    }
    runner_cfg.director.validate()?;

    let logger = RunLogger::new(format!("run-{}", chrono::Utc::now().timestamp()));
    logger.log_start(&format!("{} cameras, target {}s", runner_cfg.director.cameras.len(), runner_cfg.director.duration_secs));

    let streams = open_streams(&runner_cfg).await?;

    let model = Arc::new(OnnxBallDetector::new(BallDetectorConfig {
        model_path: runner_cfg.model_path.clone(),
        nms_threshold: runner_cfg.nms_threshold,
        input_size: runner_cfg.input_size,
    })?) as Arc<dyn match_models::DetectionModel>;

    let sink: Box<dyn FrameSink> = Box::new(
        FfmpegFrameSink::new(runner_cfg.output_path.clone())
            .with_crf(runner_cfg.crf)
            .with_preset(runner_cfg.preset.clone()),
    );

    let orchestrator = Orchestrator::new(runner_cfg.director.clone(), streams, model, sink)?;

    let report = tokio::task::spawn_blocking(move || orchestrator.run(cancel))
        .await
        .map_err(|e| RunnerError::Io(std::io::Error::other(e.to_string())))??
        .report;

    for warning in &report.warnings {
        logger.log_warning(&format!("camera {} wrote {:.1}% of frames", warning.camera_id, warning.percent));
    }
    logger.log_completion(&format!("{} frames written, {} switches", report.written, report.switches.len()));

    let report_path = report_path_for(&runner_cfg.output_path);
    std::fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;
    info!(path = %report_path.display(), "wrote run report");

    Ok(report)
}

/// `directorctl validate --config <path>`
///
/// Loads and validates configuration only — role uniqueness, zone
/// rectangles, stream count, threshold ranges — without opening any stream.
/// Returns the resolved, pretty-printed config on success.
pub fn run_validate_command(config_path: &Path) -> RunnerResult<DirectorConfig> {
    let runner_cfg = RunnerConfig::load(Some(config_path))?;
    runner_cfg.director.validate()?;
    Ok(runner_cfg.director)
}

/// `directorctl report --config <path> --report <path>`
///
/// Pretty-prints a previously written JSON run report to the terminal.
pub fn run_report_command(report_path: &Path) -> RunnerResult<RunReport> {
    let bytes = std::fs::read(report_path)?;
    let report: RunReport = serde_json::from_slice(&bytes)?;
    Ok(report)
}

async fn open_streams(cfg: &RunnerConfig) -> RunnerResult<Vec<Box<dyn FrameStream>>> {
    let mut streams: Vec<Box<dyn FrameStream>> = Vec::with_capacity(cfg.director.cameras.len());
    for camera in &cfg.director.cameras {
        let id = camera.id;
        let source = camera.source.clone();
        let retry_cfg = RetryConfig::new(format!("open_stream[{id}]")).with_max_retries(2);
        let result = retry_async(&retry_cfg, || {
            let source = source.clone();
            async move {
                tokio::task::spawn_blocking(move || FfmpegFrameStream::open(id, source))
                    .await
                    .map_err(|e| match_video::MediaError::internal(e.to_string()))?
            }
        })
        .await;

        match result {
            crate::retry::RetryResult::Success(stream) => streams.push(Box::new(stream)),
            crate::retry::RetryResult::Failed { error, .. } => {
                warn!(camera_id = id, "failed to open stream: {error}");
                return Err(RunnerError::Media(error));
            }
        }
    }
    Ok(streams)
}

fn report_path_for(output_path: &Path) -> PathBuf {
    let mut path = output_path.to_path_buf();
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    path.set_file_name(format!("{stem}.report.json"));
    path
}
