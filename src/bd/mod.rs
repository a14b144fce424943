//! Bjontegaard-style delta metrics between rate-distortion curves.
//!
//! Both curves are interpolated as size-versus-quality over the quality range
//! they share, sampled on an evenly spaced interior grid, and reduced to one
//! scalar:
//!
//! - [`BdMode::Ratio`]: mean of `candidate / reference` over the grid. This is
//!   a rate ratio on interpolated byte counts, not the classical integral.
//! - [`BdMode::Log`]: `exp(mean(ln candidate - ln reference))`, the classical
//!   BD-rate form expressed as a ratio.
//!
//! In both modes `1.0` means parity and lower means the candidate needs fewer
//! bytes for the same quality.
//!
//! ## Example
//!
//! ```
//! use rd_eval::bd::{bd_metric, BdMode};
//! use rd_eval::curve::Curve;
//!
//! let reference = Curve::from_pairs(&[(30.0, 1000), (35.0, 2000), (40.0, 4000), (45.0, 8000)]).unwrap();
//! let candidate = Curve::from_pairs(&[(30.0, 900), (35.0, 1800), (40.0, 3600), (45.0, 7200)]).unwrap();
//!
//! let ratio = bd_metric(&reference, &candidate, 100, BdMode::Ratio).unwrap();
//! assert!((ratio - 0.9).abs() < 1e-9);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::curve::{Curve, QualityRange};
use crate::error::{Error, Result};
use crate::interpolation::{Interpolant, LowOrder};
use crate::stats::mean;

/// Default number of grid points.
pub const DEFAULT_GRID_POINTS: usize = 100;

/// Reduction applied to the interpolated sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BdMode {
    /// Mean pointwise ratio of interpolated sizes.
    #[default]
    Ratio,
    /// Exponentiated mean difference of interpolated log sizes.
    Log,
}

impl fmt::Display for BdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ratio => write!(f, "ratio"),
            Self::Log => write!(f, "log"),
        }
    }
}

impl FromStr for BdMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ratio" | "linear" => Ok(Self::Ratio),
            "log" | "bd-rate" => Ok(Self::Log),
            other => Err(format!("unknown BD mode '{other}' (expected ratio or log)")),
        }
    }
}

/// Options for a BD comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BdOptions {
    /// Number of interior grid points.
    pub points: usize,
    /// Reduction mode.
    pub mode: BdMode,
    /// Policy for curves too sparse for a cubic fit.
    #[serde(default)]
    pub low_order: LowOrder,
}

impl Default for BdOptions {
    fn default() -> Self {
        Self {
            points: DEFAULT_GRID_POINTS,
            mode: BdMode::Ratio,
            low_order: LowOrder::Reject,
        }
    }
}

impl BdOptions {
    /// Options with the given grid size and mode and the default low-order policy.
    #[must_use]
    pub fn new(points: usize, mode: BdMode) -> Self {
        Self {
            points,
            mode,
            ..Self::default()
        }
    }
}

/// A curve interpolated in the value domain of a [`BdMode`].
struct FittedCurve {
    interpolant: Interpolant,
}

impl FittedCurve {
    fn fit(curve: &Curve, mode: BdMode, low_order: LowOrder) -> Result<Self> {
        let values = match mode {
            BdMode::Ratio => curve.sizes(),
            BdMode::Log => curve
                .samples()
                .iter()
                .map(|s| match s.size_bytes() {
                    0 => Err(Error::InvalidSize(0)),
                    size => Ok((size as f64).ln()),
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let interpolant = Interpolant::fit(&curve.qualities(), &values, low_order)?;
        Ok(Self { interpolant })
    }

    fn sample(&self, grid: &[f64]) -> Result<Vec<f64>> {
        grid.iter().map(|&q| self.interpolant.evaluate(q)).collect()
    }
}

fn reduce(reference: &[f64], candidate: &[f64], mode: BdMode) -> f64 {
    match mode {
        BdMode::Ratio => {
            let ratios: Vec<f64> = candidate.iter().zip(reference).map(|(c, r)| c / r).collect();
            mean(&ratios)
        }
        BdMode::Log => mean_difference(reference, candidate).exp(),
    }
}

fn mean_difference(reference: &[f64], candidate: &[f64]) -> f64 {
    let deltas: Vec<f64> = candidate.iter().zip(reference).map(|(c, r)| c - r).collect();
    mean(&deltas)
}

/// Compare `candidate` against `reference` over their shared quality range.
///
/// Fails when the ranges do not overlap, when either curve is too sparse for
/// a cubic fit, or when `n_points` is zero.
pub fn bd_metric(
    reference: &Curve,
    candidate: &Curve,
    n_points: usize,
    mode: BdMode,
) -> Result<f64> {
    bd_metric_with(reference, candidate, &BdOptions::new(n_points, mode))
}

/// [`bd_metric`] with full options.
pub fn bd_metric_with(reference: &Curve, candidate: &Curve, options: &BdOptions) -> Result<f64> {
    let range = QualityRange::overlap(reference, candidate)?;
    bd_metric_in_range(reference, candidate, range, options)
}

/// Compare two curves on an explicit quality range.
///
/// The range must lie inside both curves' extents; grid points outside either
/// fitted domain fail with [`Error::OutOfDomain`].
pub fn bd_metric_in_range(
    reference: &Curve,
    candidate: &Curve,
    range: QualityRange,
    options: &BdOptions,
) -> Result<f64> {
    let grid = range.grid(options.points)?;
    let reference = FittedCurve::fit(reference, options.mode, options.low_order)?.sample(&grid)?;
    let candidate = FittedCurve::fit(candidate, options.mode, options.low_order)?.sample(&grid)?;
    Ok(reduce(&reference, &candidate, options.mode))
}

/// Mean of `ln candidate - ln reference` over the grid, before exponentiation.
///
/// Zero for identical curves; `ln(0.9)` for a candidate that is uniformly 10%
/// smaller.
pub fn mean_log_delta(reference: &Curve, candidate: &Curve, n_points: usize) -> Result<f64> {
    let range = QualityRange::overlap(reference, candidate)?;
    let grid = range.grid(n_points)?;
    let reference = FittedCurve::fit(reference, BdMode::Log, LowOrder::Reject)?.sample(&grid)?;
    let candidate = FittedCurve::fit(candidate, BdMode::Log, LowOrder::Reject)?.sample(&grid)?;
    Ok(mean_difference(&reference, &candidate))
}

/// Score every curve of one video against the curve tagged `baseline`.
///
/// All curves are sampled on the quality range common to the whole set, so
/// the scores of different tags are comparable. Errors name the video and the
/// offending tag.
pub fn against_baseline(
    video: &str,
    curves: &BTreeMap<String, Curve>,
    baseline: &str,
    options: &BdOptions,
) -> Result<BTreeMap<String, f64>> {
    let base = curves.get(baseline).ok_or_else(|| {
        Error::Catalog(format!("no curve for baseline '{baseline}' on {video}"))
    })?;
    let range =
        QualityRange::common(curves.values()).map_err(|e| e.for_comparison(video, baseline))?;
    let grid = range.grid(options.points)?;

    let base_values = FittedCurve::fit(base, options.mode, options.low_order)
        .and_then(|f| f.sample(&grid))
        .map_err(|e| e.for_comparison(video, baseline))?;

    curves
        .iter()
        .map(|(tag, curve)| {
            let values = FittedCurve::fit(curve, options.mode, options.low_order)
                .and_then(|f| f.sample(&grid))
                .map_err(|e| e.for_comparison(video, tag))?;
            Ok((tag.clone(), reduce(&base_values, &values, options.mode)))
        })
        .collect()
}

/// Score every curve of one video relative to the most efficient one.
///
/// Each tag's mean interpolated log size is taken over the common range; the
/// smallest mean is subtracted and the difference exponentiated, so the best
/// configuration scores exactly `1.0` and the others their rate ratio to it.
pub fn relative_to_best(
    video: &str,
    curves: &BTreeMap<String, Curve>,
    points: usize,
    low_order: LowOrder,
) -> Result<BTreeMap<String, f64>> {
    let range = QualityRange::common(curves.values())
        .map_err(|e| e.for_comparison(video, "*"))?;
    let grid = range.grid(points)?;

    let mut means = BTreeMap::new();
    for (tag, curve) in curves {
        let values = FittedCurve::fit(curve, BdMode::Log, low_order)
            .and_then(|f| f.sample(&grid))
            .map_err(|e| e.for_comparison(video, tag))?;
        means.insert(tag.clone(), mean(&values));
    }

    let best = means.values().copied().fold(f64::INFINITY, f64::min);
    Ok(means
        .into_iter()
        .map(|(tag, m)| (tag, (m - best).exp()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Curve {
        Curve::from_pairs(&[(30.0, 1000), (35.0, 2000), (40.0, 4000), (45.0, 8000)]).unwrap()
    }

    fn scaled(curve: &Curve, k: f64) -> Curve {
        let pairs: Vec<(f64, u64)> = curve
            .samples()
            .iter()
            .map(|s| (s.quality(), (s.size_bytes() as f64 * k).round() as u64))
            .collect();
        Curve::from_pairs(&pairs).unwrap()
    }

    fn measured() -> Curve {
        Curve::from_pairs(&[
            (31.2, 1180),
            (33.9, 1730),
            (36.4, 2610),
            (38.8, 3890),
            (41.1, 5920),
            (43.5, 9100),
        ])
        .unwrap()
    }

    #[test]
    fn test_uniformly_smaller_candidate() {
        let candidate = scaled(&reference(), 0.9);
        for n in [1, 2, 7, 10, 100, 1000] {
            let ratio = bd_metric(&reference(), &candidate, n, BdMode::Ratio).unwrap();
            assert!((ratio - 0.9).abs() < 1e-9, "n={n}: {ratio}");
        }
    }

    #[test]
    fn test_self_comparison_is_exact() {
        for curve in [reference(), measured()] {
            for n in [1, 3, 10, 100] {
                assert_eq!(bd_metric(&curve, &curve, n, BdMode::Ratio).unwrap(), 1.0);
                assert_eq!(bd_metric(&curve, &curve, n, BdMode::Log).unwrap(), 1.0);
                assert_eq!(mean_log_delta(&curve, &curve, n).unwrap(), 0.0);
            }
        }
    }

    #[test]
    fn test_ratio_scales_linearly() {
        let base = bd_metric(&reference(), &measured(), 50, BdMode::Ratio).unwrap();
        assert!(base.is_finite() && base > 0.0);

        let doubled = scaled(&measured(), 2.0);
        let got = bd_metric(&reference(), &doubled, 50, BdMode::Ratio).unwrap();
        assert!((got - 2.0 * base).abs() < 1e-9 * base.max(1.0), "{got} vs {}", 2.0 * base);
    }

    #[test]
    fn test_log_mode_matches_uniform_scale() {
        let candidate = scaled(&reference(), 0.9);
        let log = bd_metric(&reference(), &candidate, 100, BdMode::Log).unwrap();
        assert!((log - 0.9).abs() < 1e-9);
        let delta = mean_log_delta(&reference(), &candidate, 100).unwrap();
        assert!((delta - 0.9f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_partial_overlap() {
        let candidate =
            Curve::from_pairs(&[(33.0, 1500), (37.0, 2700), (41.0, 4800), (47.0, 11000)]).unwrap();
        let ratio = bd_metric(&reference(), &candidate, 100, BdMode::Ratio).unwrap();
        assert!(ratio.is_finite() && ratio > 0.0);
    }

    #[test]
    fn test_no_overlap_fails() {
        let high =
            Curve::from_pairs(&[(45.0, 9000), (46.0, 9500), (47.0, 10000), (48.0, 11000)]).unwrap();
        assert!(matches!(
            bd_metric(&reference(), &high, 10, BdMode::Ratio),
            Err(Error::NoOverlap { .. })
        ));
    }

    #[test]
    fn test_sparse_curve_rejected() {
        let sparse = Curve::from_pairs(&[(30.0, 1000), (37.0, 2500), (45.0, 8000)]).unwrap();
        assert!(matches!(
            bd_metric(&reference(), &sparse, 10, BdMode::Ratio),
            Err(Error::InsufficientSamples { .. })
        ));

        let options = BdOptions {
            low_order: LowOrder::Polynomial,
            ..BdOptions::new(10, BdMode::Ratio)
        };
        assert!(bd_metric_with(&reference(), &sparse, &options).is_ok());
    }

    #[test]
    fn test_lossless_sample_uses_ceiling() {
        let with_lossless = Curve::from_pairs(&[
            (80.0, 1000),
            (90.0, 2000),
            (95.0, 4000),
            (f64::INFINITY, 8000),
        ])
        .unwrap();
        let other =
            Curve::from_pairs(&[(85.0, 1500), (92.0, 2800), (97.0, 5000), (99.0, 6000)]).unwrap();
        assert_eq!(with_lossless.range().max, 100.0);
        let ratio = bd_metric(&with_lossless, &other, 10, BdMode::Ratio).unwrap();
        assert!(ratio.is_finite());
    }

    #[test]
    fn test_against_baseline() {
        let mut curves = BTreeMap::new();
        curves.insert("x265".to_string(), reference());
        curves.insert("wrenc@extra".to_string(), scaled(&reference(), 0.8));
        let scores = against_baseline("a.y4m", &curves, "x265", &BdOptions::default()).unwrap();
        assert_eq!(scores["x265"], 1.0);
        assert!((scores["wrenc@extra"] - 0.8).abs() < 1e-9);

        let err = against_baseline("a.y4m", &curves, "x264", &BdOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[test]
    fn test_against_baseline_names_offender() {
        let mut curves = BTreeMap::new();
        curves.insert("base".to_string(), reference());
        curves.insert(
            "sparse".to_string(),
            Curve::from_pairs(&[(30.0, 900), (45.0, 7000)]).unwrap(),
        );
        let err = against_baseline("clip.y4m", &curves, "base", &BdOptions::default()).unwrap_err();
        match err {
            Error::Comparison { video, tag, .. } => {
                assert_eq!(video, "clip.y4m");
                assert_eq!(tag, "sparse");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_relative_to_best() {
        let mut curves = BTreeMap::new();
        curves.insert("a".to_string(), reference());
        curves.insert("b".to_string(), scaled(&reference(), 0.5));
        let scores = relative_to_best("v", &curves, 20, LowOrder::Reject).unwrap();
        assert_eq!(scores["b"], 1.0);
        assert!((scores["a"] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("ratio".parse::<BdMode>().unwrap(), BdMode::Ratio);
        assert_eq!("LOG".parse::<BdMode>().unwrap(), BdMode::Log);
        assert!("psnr".parse::<BdMode>().is_err());
        assert_eq!(BdMode::Log.to_string(), "log");
    }
}
