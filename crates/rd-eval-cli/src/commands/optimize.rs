//! Parameter search command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rd_eval::search::{Direction, Sampler, SearchSpace, Study, SweepObjective, optimize};
use rd_eval::sweep::ReferenceProfile;

use super::{BdArgs, RunArgs, load_catalog, select_videos};

pub struct OptimizeArgs {
    pub space: PathBuf,
    pub candidate: String,
    pub reference: String,
    pub qp_offset: Option<i32>,
    pub param_name: String,
    pub trials: usize,
    pub study_file: PathBuf,
    pub study_name: String,
    pub direction: Direction,
    pub seed: u64,
    pub random: bool,
    pub videos: Vec<String>,
}

pub fn run(catalog_dir: &Path, args: OptimizeArgs, run: &RunArgs, bd: &BdArgs) -> Result<()> {
    let catalog = load_catalog(catalog_dir)?;
    let space = SearchSpace::load(&args.space)
        .with_context(|| format!("loading search space {}", args.space.display()))?;
    let mut study = Study::open(&args.study_file, &args.study_name, args.direction, args.seed)?;

    let mut profile = ReferenceProfile::named(&args.reference);
    if let Some(offset) = args.qp_offset {
        profile.qp_offset = offset;
    }
    let sampler = if args.random {
        Sampler::Random
    } else {
        Sampler::default()
    };

    let acquirer = run.acquirer(&catalog)?;
    let pool = run.pool()?;
    let mut objective = SweepObjective::new(
        &catalog,
        &acquirer,
        &pool,
        &args.candidate,
        &args.param_name,
        profile,
    )?
    .with_options(run.sweep_options(bd))
    .with_videos(select_videos(&catalog, &args.videos)?);

    log::info!(
        "study '{}': {} parameters, {} trials ({} recorded)",
        study.name,
        space.len(),
        args.trials,
        study.trials.len()
    );
    let best = optimize(&mut study, &space, &sampler, &mut objective, args.trials)?;

    println!(
        "Best is trial {} with value {}",
        best.number,
        best.value().unwrap_or(f64::NAN)
    );
    println!("{}", best.params);
    Ok(())
}
