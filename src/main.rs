//! CLI Entry Point for burn-post
//!
//! Post-processes burn test datasets. Each dataset is a directory under the
//! data directory holding `pre.dat`, `post.dat` and `burn.dat`; results land in
//! its `post1/` sub-directory.
//!
//! # Usage
//!
//! Every dataset, one after another:
//! ```bash
//! burn-post
//! ```
//!
//! Two datasets picked by name suffix, replacing earlier results, four workers:
//! ```bash
//! burn-post 093000 120000 --force --workers 4
//! ```
//!
//! The bare words `force` and `quiet` are accepted in place of the flags.

use anyhow::{Context, Result};
use burn_post::config::{PostConfig, DEFAULT_CONFIG_PATH};
use burn_post::pipeline::{self, DatasetJob, DatasetPipeline};
use burn_post::tracing_setup;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "burn-post")]
#[command(about = "Post-process burn test captures into conditions, events and I-V animations", long_about = None)]
struct Cli {
    /// Dataset name suffixes, or "all" (default: every dataset)
    datasets: Vec<String>,

    /// Replace existing results directories
    #[arg(long)]
    force: bool,

    /// Only report warnings and failures
    #[arg(long)]
    quiet: bool,

    /// Parallel dataset workers; 0 processes datasets sequentially
    #[arg(long)]
    workers: Option<usize>,

    /// Configuration file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory holding the datasets
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Move the bare words `force` and `quiet` out of the dataset list.
    fn normalize(&mut self) {
        let mut selectors = Vec::with_capacity(self.datasets.len());
        for word in self.datasets.drain(..) {
            match word.as_str() {
                "force" => self.force = true,
                "quiet" => self.quiet = true,
                _ => selectors.push(word),
            }
        }
        self.datasets = selectors;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.normalize();

    let mut config = PostConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(dir) = cli.data_dir.take() {
        config.layout.data_dir = dir;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    tracing_setup::init_from_config(&config, cli.quiet).map_err(anyhow::Error::msg)?;

    let data_dir = config.layout.data_dir.clone();
    let jobs: Vec<DatasetJob> = pipeline::resolve(&data_dir, &cli.datasets)
        .with_context(|| format!("selecting datasets in {}", data_dir.display()))?
        .into_iter()
        .map(|source| DatasetJob::new(source, cli.force, cli.quiet))
        .collect();

    if jobs.is_empty() {
        tracing::warn!(data_dir = %data_dir.display(), "no datasets found");
        return Ok(());
    }

    let workers = config.workers;
    let runner = DatasetPipeline::new(Arc::new(config));

    if workers == 0 {
        let reports = pipeline::run_sequential(&runner, &jobs)?;
        tracing::info!(datasets = reports.len(), "all datasets processed");
        return Ok(());
    }

    let results = pipeline::run_parallel(Arc::new(runner), jobs, workers).await;
    pipeline::summarize_results(&results)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_words_act_as_flags() {
        let mut cli = Cli::parse_from(["burn-post", "force", "093000", "quiet", "all"]);
        cli.normalize();
        assert!(cli.force);
        assert!(cli.quiet);
        assert_eq!(cli.datasets, vec!["093000", "all"]);
    }

    #[test]
    fn flags_and_defaults() {
        let mut cli = Cli::parse_from(["burn-post", "--workers", "4", "--data-dir", "/srv/burns"]);
        cli.normalize();
        assert!(!cli.force);
        assert!(cli.datasets.is_empty());
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/burns")));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
