//! Running many datasets.
//!
//! Datasets share nothing, so the pool is a plain fan-out: every job gets its
//! own blocking task, a semaphore bounds how many run at once, and results are
//! collected in job order. A failing or panicking dataset only produces an
//! `Err` entry for itself.

use super::{DatasetFailure, DatasetJob, DatasetPipeline, DatasetReport, PipelineStage};
use crate::capture::CaptureLoader;
use crate::error::PostError;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Run `jobs` one after another, stopping at the first failure.
pub fn run_sequential<L: CaptureLoader>(
    pipeline: &DatasetPipeline<L>,
    jobs: &[DatasetJob],
) -> Result<Vec<DatasetReport>, DatasetFailure> {
    jobs.iter().map(|job| pipeline.run(job)).collect()
}

/// Run every job on up to `workers` blocking tasks.
///
/// All jobs run regardless of failures elsewhere. The returned vector has one
/// entry per job, in the order given.
pub async fn run_parallel<L>(
    pipeline: Arc<DatasetPipeline<L>>,
    jobs: Vec<DatasetJob>,
    workers: usize,
) -> Vec<Result<DatasetReport, DatasetFailure>>
where
    L: CaptureLoader + 'static,
{
    let limit = Arc::new(Semaphore::new(workers.max(1)));
    tracing::info!(datasets = jobs.len(), workers = workers.max(1), "starting worker pool");

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let name = job.name.clone();
            let pipeline = Arc::clone(&pipeline);
            let limit = Arc::clone(&limit);
            let handle = tokio::spawn(async move {
                let _permit = match limit.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return Err(worker_failure(&job.name, e)),
                };
                let name = job.name.clone();
                match tokio::task::spawn_blocking(move || pipeline.run(&job)).await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(worker_failure(&name, e)),
                }
            });
            (name, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        results.push(match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(worker_failure(&name, e)),
        });
    }
    results
}

/// Log every failure of a parallel run and turn the outcome into one result.
///
/// Returns the number of datasets processed when all succeeded, otherwise
/// [`PostError::DatasetsFailed`].
pub fn summarize_results(
    results: &[Result<DatasetReport, DatasetFailure>],
) -> Result<usize, PostError> {
    let mut failed = 0;
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        tracing::error!(
            dataset = %failure.name,
            stage = %failure.stage,
            kind = failure.error.kind(),
            "{}",
            failure.error
        );
        failed += 1;
    }
    if failed > 0 {
        return Err(PostError::DatasetsFailed {
            failed,
            total: results.len(),
        });
    }
    tracing::info!(datasets = results.len(), "all datasets processed");
    Ok(results.len())
}

fn worker_failure(name: &str, cause: impl Display) -> DatasetFailure {
    DatasetFailure {
        name: name.to_string(),
        stage: PipelineStage::Failed,
        error: PostError::Worker(cause.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{write_capture, CaptureConfig};
    use crate::config::PostConfig;
    use crate::data::ChannelStore;
    use std::path::Path;

    fn pipeline() -> DatasetPipeline {
        let mut config = PostConfig::default();
        config.render.width = 64;
        config.render.height = 48;
        DatasetPipeline::new(Arc::new(config))
    }

    fn good_dataset(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        let store = ChannelStore::from_pairs(
            4.0,
            [
                ("Voltage", vec![-1.0, 3.0, -1.0, 3.0]),
                ("Current", vec![0.0, 50.0, 0.0, 50.0]),
            ],
        )
        .unwrap();
        let config = CaptureConfig::new(4.0).with_ao_frequency(2.0);
        write_capture(&dir.join("burn.dat"), &config, &store).unwrap();
    }

    fn jobs(root: &Path) -> Vec<DatasetJob> {
        let good = root.join("good");
        let bad = root.join("bad");
        good_dataset(&good);
        std::fs::create_dir_all(&bad).unwrap();
        vec![
            DatasetJob::new(bad, false, true),
            DatasetJob::new(good, false, true),
        ]
    }

    #[test]
    fn sequential_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = jobs(dir.path());

        let failure = run_sequential(&pipeline(), &jobs).unwrap_err();
        assert_eq!(failure.name, "bad");
        assert!(!dir.path().join("good").join("post1").exists());
    }

    #[tokio::test]
    async fn parallel_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = jobs(dir.path());

        let results = run_parallel(Arc::new(pipeline()), jobs, 2).await;
        assert_eq!(results.len(), 2);

        let failure = results[0].as_ref().unwrap_err();
        assert_eq!(failure.name, "bad");
        assert_eq!(failure.error.kind(), "capture_load");

        let report = results[1].as_ref().unwrap();
        assert_eq!(report.name, "good");
        assert_eq!(report.stage, PipelineStage::Done);
        assert_eq!(report.voltage_events, 3);
        assert_eq!(report.animation_frames, 2);
    }

    #[tokio::test]
    async fn zero_workers_still_makes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("only");
        good_dataset(&good);

        let results = run_parallel(
            Arc::new(pipeline()),
            vec![DatasetJob::new(good, false, true)],
            0,
        )
        .await;
        assert!(results[0].is_ok());
    }
}
