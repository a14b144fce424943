//! Subcommands and the options they share.

pub mod bd;
pub mod compare;
pub mod evaluate;
pub mod optimize;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use rd_eval::bd::{BdMode, BdOptions};
use rd_eval::catalog::{Catalog, ParamValue, VideoDescriptor};
use rd_eval::sweep::{FailurePolicy, SweepOptions};
use rd_eval::{Acquirer, DuplicateQuality, LowOrder, ScratchDir, TaskPool};

/// Options for running encoder and metric tools.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of parallel workers (0 = all cores)
    #[arg(short = 'j', long, default_value_t = 8)]
    pub workers: usize,

    /// Kill any tool invocation that runs longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Directory for the per-run scratch directory (defaults to the system temp dir)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Keep compressed outputs after the run
    #[arg(long)]
    pub keep_outputs: bool,

    /// Skip videos whose samples fail instead of aborting
    #[arg(long)]
    pub skip_failed: bool,
}

/// Options for the BD computation.
#[derive(Args, Debug, Clone)]
pub struct BdArgs {
    /// BD reduction: ratio (mean size ratio) or log (classical BD-rate)
    #[arg(long, default_value = "ratio")]
    pub mode: BdMode,

    /// Number of interior grid points
    #[arg(long, default_value_t = rd_eval::bd::DEFAULT_GRID_POINTS)]
    pub points: usize,

    /// Fit curves with fewer than four samples with an interpolating polynomial
    #[arg(long)]
    pub polynomial_fallback: bool,

    /// Keep the smallest sample among equal qualities instead of failing
    #[arg(long)]
    pub keep_smallest: bool,
}

impl BdArgs {
    pub fn options(&self) -> BdOptions {
        BdOptions {
            points: self.points,
            mode: self.mode,
            low_order: if self.polynomial_fallback {
                LowOrder::Polynomial
            } else {
                LowOrder::Reject
            },
        }
    }

    pub fn duplicates(&self) -> DuplicateQuality {
        if self.keep_smallest {
            DuplicateQuality::KeepSmallest
        } else {
            DuplicateQuality::Reject
        }
    }
}

impl RunArgs {
    pub fn sweep_options(&self, bd: &BdArgs) -> SweepOptions {
        SweepOptions {
            bd: bd.options(),
            duplicates: bd.duplicates(),
            failure: if self.skip_failed {
                FailurePolicy::SkipVideo
            } else {
                FailurePolicy::Abort
            },
            ..SweepOptions::default()
        }
    }

    pub fn pool(&self) -> Result<TaskPool> {
        TaskPool::new(self.workers).context("creating worker pool")
    }

    pub fn acquirer(&self, catalog: &Catalog) -> Result<Acquirer> {
        let run_id = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        let scratch = ScratchDir::create(self.scratch_dir.as_deref(), &run_id, self.keep_outputs)
            .context("creating scratch directory")?;
        log::debug!("scratch directory: {}", scratch.path().display());
        Ok(Acquirer::from_catalog(catalog, scratch).with_timeout(self.timeout.map(Duration::from_secs)))
    }
}

pub fn load_catalog(dir: &std::path::Path) -> Result<Catalog> {
    Catalog::load(dir).with_context(|| format!("loading catalog from {}", dir.display()))
}

/// All catalog videos, or only the named ones.
pub fn select_videos(catalog: &Catalog, names: &[String]) -> Result<Vec<VideoDescriptor>> {
    if names.is_empty() {
        return Ok(catalog.video_list());
    }
    names
        .iter()
        .map(|name| catalog.video(name).map_err(anyhow::Error::from))
        .collect()
}

/// Parse `name=value`, reading the value as an integer, a real or text.
pub fn parse_param(arg: &str) -> Result<(String, ParamValue)> {
    let (name, value) = arg
        .split_once('=')
        .with_context(|| format!("expected name=value, got '{arg}'"))?;
    let value = if let Ok(i) = value.parse::<i64>() {
        ParamValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        ParamValue::Float(f)
    } else {
        ParamValue::Text(value.to_string())
    };
    Ok((name.trim().to_string(), value))
}
