//! Head-to-head comparison of one candidate configuration against one
//! reference encoder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Configuration, Reference, SweepOptions, SweepOutcome, SweepPlan, run_sweep};
use crate::acquire::Acquirer;
use crate::catalog::VideoDescriptor;
use crate::error::{Error, Result};
use crate::pool::TaskPool;
use crate::stats::ScoreSpread;

/// Identity of a reference encoder and how its QPs map onto the candidate's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    /// Reference name (also its preset name in catalogs).
    pub name: String,
    /// Added to every candidate QP to get the reference QP.
    pub qp_offset: i32,
}

impl ReferenceProfile {
    /// HEVC reference (`x265`, placebo preset), QPs shifted by +3.
    #[must_use]
    pub fn x265() -> Self {
        Self {
            name: "x265".to_string(),
            qp_offset: 3,
        }
    }

    /// AVC reference (`x264`, superfast preset), QPs shifted by +6.
    #[must_use]
    pub fn x264() -> Self {
        Self {
            name: "x264".to_string(),
            qp_offset: 6,
        }
    }

    /// Built-in profile by name, or a profile with no offset.
    #[must_use]
    pub fn named(name: &str) -> Self {
        match name {
            "x265" => Self::x265(),
            "x264" => Self::x264(),
            other => Self {
                name: other.to_string(),
                qp_offset: 0,
            },
        }
    }
}

/// Candidate vs reference on a shared QP list.
#[derive(Debug, Clone)]
pub struct HeadToHead {
    /// Candidate configuration; its QP list drives both sides.
    pub candidate: Configuration,
    /// Reference configuration; its own QP list is replaced.
    pub reference: Configuration,
    /// Reference identity and QP offset.
    pub profile: ReferenceProfile,
}

/// Per-video candidate/reference ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Candidate tag.
    pub candidate: String,
    /// Reference tag.
    pub reference: String,
    /// Video → BD score of the candidate.
    pub per_video: BTreeMap<String, f64>,
    /// Mean over videos.
    pub mean: f64,
    /// Spread of the per-video scores.
    pub spread: Option<ScoreSpread>,
}

impl HeadToHead {
    /// Build the two-configuration plan this comparison runs.
    pub fn plan(&self, videos: Vec<VideoDescriptor>) -> Result<SweepPlan> {
        if self.candidate.tag == self.reference.tag {
            return Err(Error::Catalog(format!(
                "candidate and reference share the tag '{}'",
                self.candidate.tag
            )));
        }
        let mut reference = self.reference.clone();
        reference.qps = self.candidate.qps.clone();
        let reference = reference.with_qp_offset(self.profile.qp_offset);
        let baseline = reference.tag.clone();
        SweepPlan::new(vec![reference, self.candidate.clone()], videos, baseline)
    }

    /// Run both encoders on every video and score the candidate.
    pub fn compare(
        &self,
        videos: Vec<VideoDescriptor>,
        acquirer: &Acquirer,
        pool: &TaskPool,
        options: &SweepOptions,
    ) -> Result<(ComparisonResult, SweepOutcome)> {
        let options = SweepOptions {
            reference: Reference::Baseline,
            ..options.clone()
        };
        let plan = self.plan(videos)?;
        log::info!(
            "comparing {} against {} (QP offset {:+})",
            self.candidate.tag,
            self.reference.tag,
            self.profile.qp_offset
        );
        let outcome = run_sweep(&plan, acquirer, pool, &options)?;

        let per_video: BTreeMap<String, f64> = outcome
            .table
            .videos
            .iter()
            .filter_map(|(video, scores)| {
                scores
                    .get(&self.candidate.tag)
                    .map(|&s| (video.clone(), s))
            })
            .collect();
        let mean = outcome
            .table
            .summary
            .get(&self.candidate.tag)
            .copied()
            .ok_or_else(|| Error::Report(format!("no score for {}", self.candidate.tag)))?;

        let scores: Vec<f64> = per_video.values().copied().collect();
        Ok((
            ComparisonResult {
                candidate: self.candidate.tag.clone(),
                reference: self.reference.tag.clone(),
                spread: ScoreSpread::of(&scores),
                per_video,
                mean,
            },
            outcome,
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::acquire::tests::video;
    use crate::sweep::tests::{acquirer, configuration};

    #[test]
    fn test_profiles() {
        assert_eq!(ReferenceProfile::named("x265").qp_offset, 3);
        assert_eq!(ReferenceProfile::named("x264").qp_offset, 6);
        assert_eq!(ReferenceProfile::named("aom").qp_offset, 0);
    }

    #[test]
    fn test_plan_offsets_reference_qps() {
        let dir = tempfile::tempdir().unwrap();
        let h2h = HeadToHead {
            candidate: configuration(dir.path(), "fast", &[20, 23, 26, 29], 1000),
            reference: configuration(dir.path(), "x265", &[0], 1000),
            profile: ReferenceProfile::x265(),
        };
        let plan = h2h.plan(vec![video(dir.path())]).unwrap();
        assert_eq!(plan.baseline, "x265");
        assert_eq!(plan.configurations[0].qps, vec![23, 26, 29, 32]);
        assert_eq!(plan.configurations[1].qps, vec![20, 23, 26, 29]);
    }

    #[test]
    fn test_compare_with_stub_encoders() {
        let dir = tempfile::tempdir().unwrap();
        let h2h = HeadToHead {
            candidate: configuration(dir.path(), "fast", &[20, 23, 26, 29, 32], 900),
            reference: configuration(dir.path(), "ref", &[0], 1000),
            profile: ReferenceProfile::named("ref"),
        };
        let pool = TaskPool::new(2).unwrap();
        let (result, outcome) = h2h
            .compare(vec![video(dir.path())], &acquirer(dir.path()), &pool, &SweepOptions::default())
            .unwrap();

        assert_eq!(result.reference, "ref");
        assert!((result.mean - 0.9).abs() < 1e-9);
        assert!((result.per_video["clip.yuv"] - 0.9).abs() < 1e-9);
        assert_eq!(result.spread.as_ref().map(|s| s.videos), Some(1));
        assert_eq!(outcome.table.baseline.as_deref(), Some("ref"));
    }

    #[test]
    fn test_same_tag_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let h2h = HeadToHead {
            candidate: configuration(dir.path(), "x265", &[22, 27], 1000),
            reference: configuration(dir.path(), "x265", &[22, 27], 1000),
            profile: ReferenceProfile::x265(),
        };
        assert!(h2h.plan(vec![video(dir.path())]).is_err());
    }
}
