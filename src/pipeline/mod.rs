//! Dataset pipeline: one dataset directory in, one results directory out.
//!
//! A run walks a fixed sequence of stages:
//!
//! ```text
//! Pending ──> ResultsDirReady ──> SummaryWritten ──> EventsExtracted ──> ArtifactsRendered ──> Done
//!    │              │                   │                  │                    │
//!    └──────────────┴───────────────────┴──────────────────┴────────────────────┴──> Failed
//! ```
//!
//! Leaving `Pending` requires the results directory to be absent, or the job
//! to carry `force`. Without it the run fails with
//! [`PostError::OverwriteDenied`] before touching the filesystem. With it the
//! old directory is removed in full and recreated; this is not atomic.
//!
//! Later stages do not roll back earlier ones. A failure while rendering the
//! animation leaves the summary, tables and plots already written in place.

pub mod discovery;
pub mod pool;

use crate::capture::{Capture, CaptureLoader, CsvCaptureLoader};
use crate::config::PostConfig;
use crate::data::{
    ChannelStore, ConditionsSummary, EventDetector, EventRecord, FrameWindower, SummaryAggregator,
    SummaryValue,
};
use crate::error::{AppResult, PostError};
use crate::render::{self, AnimationStyle};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use discovery::{list_datasets, resolve};
pub use pool::{run_parallel, run_sequential, summarize_results};

/// Summary record file name.
pub const CONDITIONS_FILE: &str = "conditions.json";
/// Constant-voltage event table.
pub const VTEST_TABLE: &str = "vtest.dat";
/// Constant-current event table.
pub const ITEST_TABLE: &str = "itest.dat";
/// Constant-voltage event plot.
pub const VTEST_PLOT: &str = "vtest.png";
/// Constant-current event plot.
pub const ITEST_PLOT: &str = "itest.png";
/// I-V animation.
pub const ANIMATION_FILE: &str = "ivchar.gif";

/// Progress of a dataset through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Nothing done yet
    Pending,
    /// Results directory exists and is empty
    ResultsDirReady,
    /// `conditions.json` written
    SummaryWritten,
    /// Event tables written
    EventsExtracted,
    /// Plots and animation written
    ArtifactsRendered,
    /// Run finished
    Done,
    /// Run aborted
    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Pending => write!(f, "Pending"),
            PipelineStage::ResultsDirReady => write!(f, "ResultsDirReady"),
            PipelineStage::SummaryWritten => write!(f, "SummaryWritten"),
            PipelineStage::EventsExtracted => write!(f, "EventsExtracted"),
            PipelineStage::ArtifactsRendered => write!(f, "ArtifactsRendered"),
            PipelineStage::Done => write!(f, "Done"),
            PipelineStage::Failed => write!(f, "Failed"),
        }
    }
}

/// Immutable description of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetJob {
    /// Dataset name (the directory name).
    pub name: String,
    /// Directory holding the captures.
    pub source_dir: PathBuf,
    /// Replace an existing results directory.
    pub force: bool,
    /// Suppress progress messages.
    pub quiet: bool,
}

impl DatasetJob {
    /// Job for the dataset directory at `source_dir`.
    pub fn new(source_dir: impl Into<PathBuf>, force: bool, quiet: bool) -> Self {
        let source_dir = source_dir.into();
        let name = source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_dir.display().to_string());
        Self {
            name,
            source_dir,
            force,
            quiet,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct DatasetReport {
    /// Dataset name.
    pub name: String,
    /// Results directory of this run.
    pub results_dir: PathBuf,
    /// Last stage reached.
    pub stage: PipelineStage,
    /// Rows in the constant-voltage table.
    pub voltage_events: usize,
    /// Rows in the constant-current table.
    pub current_events: usize,
    /// Frames in the animation.
    pub animation_frames: usize,
    /// Every file written, in order.
    pub artifacts: Vec<PathBuf>,
}

impl DatasetReport {
    fn new(name: &str, results_dir: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            results_dir,
            stage: PipelineStage::Pending,
            voltage_events: 0,
            current_events: 0,
            animation_frames: 0,
            artifacts: Vec::new(),
        }
    }

    fn advance(&mut self, stage: PipelineStage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage complete");
        self.stage = stage;
    }
}

/// A dataset that did not finish.
#[derive(Debug, Error)]
#[error("dataset {name} failed after {stage}: {error}")]
pub struct DatasetFailure {
    /// Dataset name.
    pub name: String,
    /// Last stage the dataset completed.
    pub stage: PipelineStage,
    /// Cause.
    #[source]
    pub error: PostError,
}

/// Runs the full post-processing sequence over single datasets.
///
/// The pipeline holds no per-dataset state, so one instance can serve any
/// number of jobs, including concurrently from the worker pool.
#[derive(Debug)]
pub struct DatasetPipeline<L: CaptureLoader = CsvCaptureLoader> {
    config: Arc<PostConfig>,
    loader: L,
}

impl DatasetPipeline<CsvCaptureLoader> {
    /// Pipeline reading text captures.
    pub fn new(config: Arc<PostConfig>) -> Self {
        Self::with_loader(config, CsvCaptureLoader)
    }
}

impl<L: CaptureLoader> DatasetPipeline<L> {
    /// Pipeline reading captures through `loader`.
    pub fn with_loader(config: Arc<PostConfig>, loader: L) -> Self {
        Self { config, loader }
    }

    /// Configuration in use.
    pub fn config(&self) -> &PostConfig {
        &self.config
    }

    /// Results directory for `job`.
    pub fn results_dir(&self, job: &DatasetJob) -> PathBuf {
        job.source_dir.join(&self.config.layout.results_dir)
    }

    /// Process one dataset.
    pub fn run(&self, job: &DatasetJob) -> Result<DatasetReport, DatasetFailure> {
        let span = tracing::info_span!("dataset", name = %job.name);
        let _enter = span.enter();

        if !job.quiet {
            tracing::info!("Working on {}", job.source_dir.display());
        }

        let mut report = DatasetReport::new(&job.name, self.results_dir(job));
        match self.execute(job, &mut report) {
            Ok(()) => {
                report.advance(PipelineStage::Done);
                if !job.quiet {
                    tracing::info!(
                        voltage_events = report.voltage_events,
                        current_events = report.current_events,
                        frames = report.animation_frames,
                        "dataset complete"
                    );
                }
                Ok(report)
            }
            Err(error) => {
                tracing::error!(stage = %report.stage, kind = error.kind(), "{}", error);
                Err(DatasetFailure {
                    name: job.name.clone(),
                    stage: report.stage,
                    error,
                })
            }
        }
    }

    fn execute(&self, job: &DatasetJob, report: &mut DatasetReport) -> AppResult<()> {
        if !job.source_dir.is_dir() {
            return Err(PostError::capture_load(
                &job.source_dir,
                "dataset directory does not exist",
            ));
        }

        prepare_results_dir(&report.results_dir, job.force)?;
        report.advance(PipelineStage::ResultsDirReady);

        let layout = &self.config.layout;
        let pre = self.load_optional(&job.source_dir.join(&layout.pre_file))?;
        let post = self.load_optional(&job.source_dir.join(&layout.post_file))?;
        let burn = self.loader.load(&job.source_dir.join(&layout.burn_file))?;

        let summary = self.summarize(
            pre.as_ref().map(|c| &c.store),
            post.as_ref().map(|c| &c.store),
            &burn,
        )?;
        let path = report.results_dir.join(CONDITIONS_FILE);
        fs::write(&path, summary.to_json_pretty()?)?;
        report.artifacts.push(path);
        report.advance(PipelineStage::SummaryWritten);

        let (vtest, itest) = self.detect_events(&burn.store)?;
        let path = report.results_dir.join(VTEST_TABLE);
        write_event_table(&path, "time (sec), current (uA)", &vtest)?;
        report.artifacts.push(path);
        let path = report.results_dir.join(ITEST_TABLE);
        write_event_table(&path, "time (sec), voltage (V)", &itest)?;
        report.artifacts.push(path);
        report.voltage_events = vtest.len();
        report.current_events = itest.len();
        report.advance(PipelineStage::EventsExtracted);

        self.render_artifacts(&burn, &vtest, &itest, report)?;
        report.advance(PipelineStage::ArtifactsRendered);
        Ok(())
    }

    fn load_optional(&self, path: &Path) -> AppResult<Option<Capture>> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "flow capture not found, skipping");
            return Ok(None);
        }
        self.loader.load(path).map(Some)
    }

    fn summarize(
        &self,
        pre: Option<&ChannelStore>,
        post: Option<&ChannelStore>,
        burn: &Capture,
    ) -> AppResult<ConditionsSummary> {
        let channels = &self.config.channels;
        let analysis = &self.config.analysis;

        let mut summary = SummaryAggregator::new(&channels.fuel, &channels.oxidizer)
            .with_ratio_policy(analysis.ratio_policy)
            .aggregate(pre, post)?;

        let standoff = match burn.config.meta_f64(&analysis.standoff_key) {
            Ok(value) => SummaryValue::Number(value),
            Err(PostError::MissingMeta(key)) => {
                tracing::warn!(key = %key, "burn capture has no standoff, recording null");
                SummaryValue::Null
            }
            Err(e) => return Err(e),
        };
        summary.insert(analysis.standoff_key.as_str(), standoff);
        summary.insert("fuel", analysis.fuel_name.as_str());
        Ok(summary)
    }

    fn detect_events(&self, burn: &ChannelStore) -> AppResult<(Vec<EventRecord>, Vec<EventRecord>)> {
        let channels = &self.config.channels;
        let analysis = &self.config.analysis;

        let vtest = EventDetector::new(&channels.voltage, &channels.current, analysis.voltage_level)
            .with_edge(analysis.edge)
            .detect(burn)?;
        let itest = EventDetector::new(&channels.current, &channels.voltage, analysis.current_level)
            .with_edge(analysis.edge)
            .detect(burn)?;
        Ok((vtest, itest))
    }

    fn render_artifacts(
        &self,
        burn: &Capture,
        vtest: &[EventRecord],
        itest: &[EventRecord],
        report: &mut DatasetReport,
    ) -> AppResult<()> {
        let analysis = &self.config.analysis;
        let style = &self.config.render;

        let path = report.results_dir.join(VTEST_PLOT);
        render::save_event_plot(
            &path,
            vtest,
            &format!("{:.1} V", analysis.voltage_level),
            render::CURRENT_LABEL,
            style.width,
            style.height,
        )?;
        report.artifacts.push(path);

        let path = report.results_dir.join(ITEST_PLOT);
        render::save_event_plot(
            &path,
            itest,
            &format!("{:.1} uA", analysis.current_level),
            render::VOLTAGE_LABEL,
            style.width,
            style.height,
        )?;
        report.artifacts.push(path);

        let fps = burn.config.output_frequency(analysis.ao_channel)?;
        let windower = FrameWindower::new(
            &burn.store,
            &self.config.channels.voltage,
            &self.config.channels.current,
            fps,
        )?;
        let path = report.results_dir.join(ANIMATION_FILE);
        report.animation_frames = render::render_animation(&path, &windower, &self.animation_style())?;
        report.artifacts.push(path);
        Ok(())
    }

    fn animation_style(&self) -> AnimationStyle {
        let render = &self.config.render;
        AnimationStyle {
            width: render.width,
            height: render.height,
            x_range: render.voltage_range,
            y_range: render.current_range,
            x_reference: self.config.analysis.voltage_level,
            y_reference: self.config.analysis.current_level,
            speedup: render.playback_speedup,
        }
    }
}

/// Create `dir` fresh, replacing an existing one only when `force` is set.
fn prepare_results_dir(dir: &Path, force: bool) -> AppResult<()> {
    if dir.exists() {
        if !force {
            return Err(PostError::OverwriteDenied(dir.to_path_buf()));
        }
        tracing::warn!(path = %dir.display(), "removing existing results");
        if dir.is_dir() {
            fs::remove_dir_all(dir)?;
        } else {
            fs::remove_file(dir)?;
        }
    }
    fs::create_dir(dir)?;
    Ok(())
}

/// Write `events` as a two-column text table under a one-line `header`.
pub fn write_event_table(path: &Path, header: &str, events: &[EventRecord]) -> AppResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{}", header)?;
    for event in events {
        writeln!(file, "{:.3}, {:.2}", event.time, event.value)?;
    }
    file.flush()?;
    Ok(())
}
