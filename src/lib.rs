//! # rd-eval
//!
//! Rate-distortion comparison and encoder parameter search for video codecs.
//!
//! The library drives external encoder and metric tools, builds
//! rate-distortion curves from their output, and reduces pairs of curves to
//! Bjontegaard-style delta scores. A search loop uses the same engine as a
//! black-box objective for tuning encoder parameters.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rd_eval::{Acquirer, Catalog, Revision, ScratchDir, SweepOptions, SweepPlan, TaskPool};
//!
//! let catalog = Catalog::load("tools/evaluation")?;
//! let plan = SweepPlan::from_catalog(
//!     &catalog,
//!     &catalog.config.default_presets,
//!     &Revision::detect(catalog.root()),
//! )?;
//! let acquirer = Acquirer::from_catalog(&catalog, ScratchDir::create(None, "run", false)?);
//!
//! let outcome = rd_eval::run_sweep(&plan, &acquirer, &TaskPool::new(8)?, &SweepOptions::default())?;
//! outcome.table.write_csv("bd_table.csv".as_ref())?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`curve`]: Samples and rate-distortion curves
//! - [`interpolation`]: Not-a-knot cubic splines and low-order fallbacks
//! - [`bd`]: BD metric calculator
//! - [`stats`]: Aggregation of per-video scores
//! - [`catalog`]: Video, metric and preset catalogs
//! - [`acquire`]: Encoder and metric tool invocation
//! - [`pool`]: Worker pool
//! - [`sweep`]: Sweep orchestration, head-to-head comparison, reports
//! - [`search`]: Parameter search loop and study store

pub mod acquire;
pub mod bd;
pub mod catalog;
pub mod curve;
pub mod error;
pub mod interpolation;
pub mod pool;
pub mod search;
pub mod stats;
pub mod sweep;

// Re-export commonly used types
pub use acquire::{Acquirer, EncodeParams, EncoderRecipe, SampleRecord, ScratchDir};
pub use bd::{BdMode, BdOptions, bd_metric};
pub use catalog::{Catalog, Preset, VideoDescriptor};
pub use curve::{Curve, DuplicateQuality, Sample};
pub use error::{Error, Result};
pub use interpolation::LowOrder;
pub use pool::TaskPool;
pub use search::{Direction, Objective, ParameterVector, Sampler, SearchSpace, Study, optimize};
pub use stats::ScoreSpread;
pub use sweep::{
    BdTable, FailurePolicy, HeadToHead, ReferenceProfile, Revision, RunSummary, SweepOptions,
    SweepPlan, run_sweep,
};
