//! Offline BD computation from two curve files.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rd_eval::bd::{BdMode, bd_metric_with, mean_log_delta};
use rd_eval::curve::{Curve, DuplicateQuality, Sample};
use serde::Deserialize;

use super::BdArgs;

#[derive(Debug, Deserialize)]
struct CurveRow {
    quality: f64,
    bytes: u64,
}

pub fn run(reference: &Path, candidate: &Path, bd: &BdArgs) -> Result<()> {
    let reference_curve = load_curve(reference, bd.duplicates())?;
    let candidate_curve = load_curve(candidate, bd.duplicates())?;

    let score = bd_metric_with(&reference_curve, &candidate_curve, &bd.options())
        .context("BD computation failed")?;
    println!("BD ({}): {:.6}", bd.mode, score);
    if bd.mode == BdMode::Log {
        let delta = mean_log_delta(&reference_curve, &candidate_curve, bd.points)?;
        println!("mean log delta: {:.6} ({:+.2}% rate)", delta, delta.exp_m1() * 100.0);
    }
    Ok(())
}

/// Read a `quality,bytes` CSV file into a curve.
fn load_curve(path: &Path, duplicates: DuplicateQuality) -> Result<Curve> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut samples = Vec::new();
    for row in reader.deserialize() {
        let row: CurveRow = row.with_context(|| format!("reading {}", path.display()))?;
        samples.push(Sample::new(row.bytes, row.quality)?);
    }
    if samples.is_empty() {
        bail!("{} has no samples", path.display());
    }
    Ok(Curve::with_policy(samples, duplicates)?)
}
