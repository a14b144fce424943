//! Rate-distortion samples and curves.
//!
//! A [`Curve`] holds one [`Sample`] per quantization level tested for one
//! encoder configuration on one video, ordered by quality. Quality values are
//! strictly increasing so the curve can be interpolated as a function of
//! quality.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Quality assigned to samples whose metric reports `+infinity`
/// (bit-exact reconstruction).
pub const QUALITY_CEILING: f64 = 100.0;

/// Clamp a reduced quality score, mapping `+infinity` to [`QUALITY_CEILING`].
#[must_use]
pub fn clamp_quality(quality: f64) -> f64 {
    if quality == f64::INFINITY {
        QUALITY_CEILING
    } else {
        quality
    }
}

/// One (compressed size, quality) measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    size_bytes: u64,
    quality: f64,
}

impl Sample {
    /// Create a sample, clamping infinite quality to the ceiling.
    ///
    /// ```
    /// use rd_eval::curve::Sample;
    ///
    /// let lossless = Sample::new(4096, f64::INFINITY).unwrap();
    /// assert_eq!(lossless.quality(), 100.0);
    /// ```
    pub fn new(size_bytes: u64, quality: f64) -> Result<Self> {
        let quality = clamp_quality(quality);
        if !quality.is_finite() {
            return Err(Error::InvalidQuality(quality));
        }
        Ok(Self {
            size_bytes,
            quality,
        })
    }

    /// Compressed size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Average quality score.
    #[must_use]
    pub fn quality(&self) -> f64 {
        self.quality
    }
}

/// What to do when two samples of a curve share a quality value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateQuality {
    /// Fail with [`Error::DuplicateQuality`].
    #[default]
    Reject,
    /// Keep the smallest file among samples with equal quality.
    KeepSmallest,
}

/// Samples for one encoder configuration on one video, sorted by quality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    samples: Vec<Sample>,
}

impl Curve {
    /// Minimum number of samples a curve may hold.
    pub const MIN_SAMPLES: usize = 2;

    /// Build a curve, rejecting duplicate quality values.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        Self::with_policy(samples, DuplicateQuality::Reject)
    }

    /// Build a curve with an explicit duplicate-quality policy.
    pub fn with_policy(mut samples: Vec<Sample>, duplicates: DuplicateQuality) -> Result<Self> {
        samples.sort_by(|a, b| {
            a.quality
                .total_cmp(&b.quality)
                .then(a.size_bytes.cmp(&b.size_bytes))
        });

        match duplicates {
            DuplicateQuality::Reject => {
                if let Some(pair) = samples.windows(2).find(|w| w[0].quality >= w[1].quality) {
                    return Err(Error::DuplicateQuality(pair[1].quality));
                }
            }
            // Sorted by size within equal quality, so the first one is the smallest.
            DuplicateQuality::KeepSmallest => samples.dedup_by(|b, a| a.quality == b.quality),
        }

        if samples.len() < Self::MIN_SAMPLES {
            return Err(Error::InsufficientSamples {
                required: Self::MIN_SAMPLES,
                actual: samples.len(),
            });
        }

        Ok(Self { samples })
    }

    /// Build a curve from `(quality, size_bytes)` pairs.
    pub fn from_pairs(pairs: &[(f64, u64)]) -> Result<Self> {
        let samples = pairs
            .iter()
            .map(|&(quality, size)| Sample::new(size, quality))
            .collect::<Result<Vec<_>>>()?;
        Self::new(samples)
    }

    /// Samples in ascending quality order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; a curve holds at least [`Self::MIN_SAMPLES`] samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Quality values in ascending order.
    #[must_use]
    pub fn qualities(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.quality).collect()
    }

    /// Sizes in bytes, ordered like [`Self::qualities`].
    #[must_use]
    pub fn sizes(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.size_bytes as f64).collect()
    }

    /// Quality extent covered by the samples.
    #[must_use]
    pub fn range(&self) -> QualityRange {
        QualityRange {
            min: self.samples[0].quality,
            max: self.samples[self.samples.len() - 1].quality,
        }
    }
}

/// Closed quality interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl QualityRange {
    /// Intersection of the quality extents of two curves.
    ///
    /// Fails with [`Error::NoOverlap`] when the intersection is empty or has
    /// zero width.
    pub fn overlap(a: &Curve, b: &Curve) -> Result<Self> {
        Self::common([a, b])
    }

    /// Intersection of the quality extents of every curve in `curves`.
    pub fn common<'a>(curves: impl IntoIterator<Item = &'a Curve>) -> Result<Self> {
        let mut min = f64::NEG_INFINITY;
        let mut max = f64::INFINITY;
        let mut any = false;
        for curve in curves {
            let range = curve.range();
            min = min.max(range.min);
            max = max.min(range.max);
            any = true;
        }
        if !any || min >= max {
            return Err(Error::NoOverlap { min, max });
        }
        Ok(Self { min, max })
    }

    /// Width of the interval.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// `n` equally spaced points strictly inside the interval.
    ///
    /// Point `i` is `min + (i + 1) * (max - min) / (n + 1)`, so neither bound
    /// is ever sampled.
    ///
    /// ```
    /// use rd_eval::curve::QualityRange;
    ///
    /// let grid = QualityRange { min: 30.0, max: 45.0 }.grid(2).unwrap();
    /// assert_eq!(grid, vec![35.0, 40.0]);
    /// ```
    pub fn grid(&self, n: usize) -> Result<Vec<f64>> {
        if n == 0 {
            return Err(Error::EmptyGrid);
        }
        let step = self.width() / (n + 1) as f64;
        Ok((0..n).map(|i| self.min + (i + 1) as f64 * step).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(size: u64, quality: f64) -> Sample {
        Sample::new(size, quality).unwrap()
    }

    #[test]
    fn test_infinite_quality_clamped() {
        let s = sample(10, f64::INFINITY);
        assert_eq!(s.quality(), QUALITY_CEILING);
        assert_eq!(s.size_bytes(), 10);
    }

    #[test]
    fn test_nan_quality_rejected() {
        assert!(matches!(
            Sample::new(10, f64::NAN),
            Err(Error::InvalidQuality(_))
        ));
        assert!(Sample::new(10, f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_curve_sorts_by_quality() {
        let curve = Curve::new(vec![
            sample(4000, 40.0),
            sample(1000, 30.0),
            sample(2000, 35.0),
        ])
        .unwrap();
        assert_eq!(curve.qualities(), vec![30.0, 35.0, 40.0]);
        assert_eq!(curve.sizes(), vec![1000.0, 2000.0, 4000.0]);
    }

    #[test]
    fn test_curve_rejects_duplicates() {
        let err = Curve::new(vec![sample(1000, 30.0), sample(900, 30.0), sample(5, 40.0)])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateQuality(q) if q == 30.0));
    }

    #[test]
    fn test_curve_keep_smallest() {
        let curve = Curve::with_policy(
            vec![
                sample(9000, f64::INFINITY),
                sample(1000, 30.0),
                sample(8000, f64::INFINITY),
            ],
            DuplicateQuality::KeepSmallest,
        )
        .unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.samples()[1].size_bytes(), 8000);
        assert_eq!(curve.samples()[1].quality(), QUALITY_CEILING);
    }

    #[test]
    fn test_curve_too_short() {
        let err = Curve::new(vec![sample(1000, 30.0)]).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientSamples {
                required: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_all_lossless_collapses() {
        // Every QP reconstructs bit-exactly: a single point after dedup.
        let samples = vec![sample(100, f64::INFINITY), sample(120, f64::INFINITY)];
        assert!(Curve::with_policy(samples.clone(), DuplicateQuality::KeepSmallest).is_err());
        assert!(matches!(
            Curve::new(samples),
            Err(Error::DuplicateQuality(q)) if q == QUALITY_CEILING
        ));
    }

    #[test]
    fn test_overlap() {
        let a = Curve::from_pairs(&[(30.0, 1), (40.0, 2), (50.0, 3)]).unwrap();
        let b = Curve::from_pairs(&[(35.0, 1), (45.0, 2), (55.0, 3)]).unwrap();
        let range = QualityRange::overlap(&a, &b).unwrap();
        assert_eq!(range, QualityRange { min: 35.0, max: 50.0 });
    }

    #[test]
    fn test_zero_width_overlap_fails() {
        let a = Curve::from_pairs(&[(30.0, 1), (40.0, 2)]).unwrap();
        let b = Curve::from_pairs(&[(40.0, 1), (50.0, 2)]).unwrap();
        assert!(matches!(
            QualityRange::overlap(&a, &b),
            Err(Error::NoOverlap { .. })
        ));

        let c = Curve::from_pairs(&[(41.0, 1), (50.0, 2)]).unwrap();
        assert!(QualityRange::overlap(&a, &c).is_err());
    }

    #[test]
    fn test_grid_excludes_bounds() {
        let range = QualityRange { min: 30.0, max: 45.0 };
        let grid = range.grid(100).unwrap();
        assert_eq!(grid.len(), 100);
        assert!(grid.iter().all(|&q| q > 30.0 && q < 45.0));
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
        assert!(matches!(range.grid(0), Err(Error::EmptyGrid)));
    }
}
