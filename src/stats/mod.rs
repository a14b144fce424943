//! Aggregation of per-video BD scores.
//!
//! - [`ScoreSpread`]: how scores of one configuration vary across videos
//! - [`mean`], [`std_dev`]: the reductions behind it

use serde::{Deserialize, Serialize};

/// Spread of one configuration's BD scores across the video catalog.
///
/// Lower scores are better, so `best` is the minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSpread {
    /// Number of videos scored.
    pub videos: usize,
    /// Mean score (the aggregate result).
    pub mean: f64,
    /// Median score.
    pub median: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Lowest score.
    pub best: f64,
    /// Highest score.
    pub worst: f64,
}

impl ScoreSpread {
    /// Spread of `scores`, or `None` when there are none.
    ///
    /// ```
    /// use rd_eval::stats::ScoreSpread;
    ///
    /// let spread = ScoreSpread::of(&[0.92, 0.88, 0.97]).unwrap();
    /// assert_eq!(spread.median, 0.92);
    /// assert_eq!(spread.best, 0.88);
    /// ```
    #[must_use]
    pub fn of(scores: &[f64]) -> Option<Self> {
        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);
        let (&best, &worst) = (sorted.first()?, sorted.last()?);

        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            videos: sorted.len(),
            mean: mean(scores),
            median,
            std_dev: std_dev(scores),
            best,
            worst,
        })
    }
}

/// Arithmetic mean. Zero for an empty slice.
///
/// ```
/// use rd_eval::stats::mean;
///
/// assert!((mean(&[0.9, 0.95, 1.0]) - 0.95).abs() < 1e-12);
/// ```
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N-1 denominator). Zero below two values.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let squares: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}
