//! Sweep evaluation command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rd_eval::sweep::{BdTable, Reference, Revision, SweepPlan, run_sweep};

use super::{BdArgs, RunArgs, load_catalog};

#[allow(clippy::too_many_arguments)]
pub fn run(
    catalog_dir: &Path,
    presets: Vec<String>,
    videos: Vec<String>,
    output: PathBuf,
    relative_to_best: bool,
    revision: Option<String>,
    run: &RunArgs,
    bd: &BdArgs,
) -> Result<()> {
    let catalog = load_catalog(catalog_dir)?;
    let presets = if presets.is_empty() {
        catalog.config.default_presets.clone()
    } else {
        presets
    };
    let revision = match revision {
        Some(id) => Revision::fixed(id),
        None => Revision::detect(catalog.root()),
    };

    let mut plan = SweepPlan::from_catalog(&catalog, &presets, &revision)?;
    if !videos.is_empty() {
        plan.retain_videos(&videos)?;
    }
    log::info!(
        "{} configurations x {} videos, {} encodes (revision {})",
        plan.configurations.len(),
        plan.videos.len(),
        plan.task_count(),
        revision.id
    );

    let mut options = run.sweep_options(bd);
    if relative_to_best {
        options.reference = Reference::Best;
    }

    let acquirer = run.acquirer(&catalog)?;
    let pool = run.pool()?;
    let outcome = run_sweep(&plan, &acquirer, &pool, &options).context("sweep failed")?;

    outcome.summary.write_json(&output.join("summary.json"))?;
    outcome.table.write_json(&output.join("bd_table.json"))?;
    outcome.table.write_csv(&output.join("bd_table.csv"))?;

    print_table(&outcome.table);
    for skipped in &outcome.skipped {
        println!("  skipped {} [{}]: {}", skipped.video, skipped.tag, skipped.reason);
    }
    Ok(())
}

fn print_table(table: &BdTable) {
    let reference = table.baseline.as_deref().unwrap_or("best per video");
    println!(
        "\nBD ({}) against {} -- {} videos\n",
        table.mode,
        reference,
        table.videos.len()
    );
    println!("  {:<60} {:>10}", "Config", "BD");
    println!("  {}", "-".repeat(72));
    for (i, (tag, score)) in table.ranked().into_iter().enumerate() {
        let marker = if i == 0 { " *" } else { "" };
        println!("  {:<60} {:>10.4}{}", tag, score, marker);
    }
    println!("\n  * = best (lowest) mean BD");
}
