//! Head-to-head comparison command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rd_eval::sweep::{Configuration, HeadToHead, ReferenceProfile, Revision};

use super::{BdArgs, RunArgs, load_catalog, parse_param, select_videos};

pub struct CompareArgs {
    pub candidate: String,
    pub reference: String,
    pub qp_offset: Option<i32>,
    pub qps: Vec<i32>,
    pub params: Vec<String>,
    pub videos: Vec<String>,
    pub output: Option<PathBuf>,
}

pub fn run(catalog_dir: &Path, args: CompareArgs, run: &RunArgs, bd: &BdArgs) -> Result<()> {
    let catalog = load_catalog(catalog_dir)?;
    let revision = Revision::detect(catalog.root());

    let mut params: BTreeMap<_, _> = catalog
        .preset(&args.candidate)?
        .swept_parameters()
        .filter_map(|(name, values)| values.first().map(|v| (name.clone(), v.clone())))
        .collect();
    for arg in &args.params {
        let (name, value) = parse_param(arg)?;
        params.insert(name, value);
    }

    let mut candidate = Configuration::new(&catalog, &args.candidate, params, &revision)?;
    if !args.qps.is_empty() {
        candidate.qps = args.qps.clone();
    }
    let reference = Configuration::new(&catalog, &args.reference, BTreeMap::new(), &revision)?;
    let mut profile = ReferenceProfile::named(&args.reference);
    if let Some(offset) = args.qp_offset {
        profile.qp_offset = offset;
    }

    let h2h = HeadToHead {
        candidate,
        reference,
        profile,
    };
    let videos = select_videos(&catalog, &args.videos)?;
    let acquirer = run.acquirer(&catalog)?;
    let pool = run.pool()?;
    let (result, _) = h2h
        .compare(videos, &acquirer, &pool, &run.sweep_options(bd))
        .context("comparison failed")?;

    println!("\n{} vs {} ({})\n", result.candidate, result.reference, bd.mode);
    println!("  {:<40} {:>10}", "Video", "BD");
    println!("  {}", "-".repeat(52));
    for (video, score) in &result.per_video {
        println!("  {:<40} {:>10.4}", video, score);
    }
    println!("  {}", "-".repeat(52));
    println!("  {:<40} {:>10.4}", "mean", result.mean);
    if let Some(spread) = &result.spread {
        println!(
            "  median {:.4}, std dev {:.4}, range {:.4}..{:.4}",
            spread.median, spread.std_dev, spread.best, spread.worst
        );
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}
