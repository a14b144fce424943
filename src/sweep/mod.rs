//! Sweep orchestration: configurations × videos × QPs → BD table.
//!
//! A [`SweepPlan`] lists the configurations to encode and the videos to
//! encode them on. [`run_sweep`] acquires every sample on a [`TaskPool`],
//! builds one curve per (configuration, video) and scores each video's
//! curves against the baseline configuration.
//!
//! ```no_run
//! use rd_eval::acquire::{Acquirer, ScratchDir};
//! use rd_eval::catalog::Catalog;
//! use rd_eval::pool::TaskPool;
//! use rd_eval::sweep::{Revision, SweepOptions, SweepPlan, run_sweep};
//!
//! let catalog = Catalog::load("tools/evaluation")?;
//! let revision = Revision::detect(catalog.root());
//! let plan = SweepPlan::from_catalog(&catalog, &catalog.config.default_presets, &revision)?;
//! let acquirer = Acquirer::from_catalog(&catalog, ScratchDir::create(None, "sweep", false)?);
//! let pool = TaskPool::new(8)?;
//!
//! let outcome = run_sweep(&plan, &acquirer, &pool, &SweepOptions::default())?;
//! for (tag, bd) in &outcome.table.summary {
//!     println!("{tag}: {bd:.4}");
//! }
//! # Ok::<(), rd_eval::Error>(())
//! ```

mod compare;
mod config;
mod report;

pub use compare::{ComparisonResult, HeadToHead, ReferenceProfile};
pub use config::{Configuration, Revision, expand, make_tag};
pub use report::{BdTable, RunSummary};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::acquire::{Acquirer, SampleRecord, sanitize};
use crate::bd::{self, BdOptions};
use crate::catalog::{Catalog, VideoDescriptor};
use crate::curve::{Curve, DuplicateQuality};
use crate::error::{Error, Result};
use crate::pool::TaskPool;

/// What a failed sample or comparison does to the sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The first failure fails the whole sweep.
    #[default]
    Abort,
    /// Drop the affected video from the BD table for every tag.
    SkipVideo,
}

/// What each video's curves are scored against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reference {
    /// The plan's baseline configuration.
    #[default]
    Baseline,
    /// The most efficient configuration on each video (log domain).
    Best,
}

/// Sweep tuning.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// BD grid, mode and low-order policy.
    pub bd: BdOptions,
    /// Duplicate-quality policy for curve construction.
    pub duplicates: DuplicateQuality,
    /// Failure handling.
    pub failure: FailurePolicy,
    /// Scoring reference.
    pub reference: Reference,
}

/// Configurations and videos of one sweep.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    /// Configurations to encode, baseline included.
    pub configurations: Vec<Configuration>,
    /// Videos to encode them on.
    pub videos: Vec<VideoDescriptor>,
    /// Tag of the baseline configuration.
    pub baseline: String,
    /// Revision recorded in the run summary.
    pub revision: Revision,
}

impl SweepPlan {
    /// Expand `presets` (plus the catalog's base preset) over all catalog videos.
    ///
    /// The base preset must expand to exactly one configuration.
    pub fn from_catalog(catalog: &Catalog, presets: &[String], revision: &Revision) -> Result<Self> {
        let base = &catalog.config.base_preset;
        let base_configs = expand(catalog, base, revision)?;
        let [baseline] = base_configs.as_slice() else {
            return Err(Error::Catalog(format!(
                "base preset '{base}' expands to {} configurations, expected 1",
                base_configs.len()
            )));
        };
        let baseline = baseline.tag.clone();

        let mut configurations = base_configs;
        for preset in presets.iter().filter(|p| *p != base) {
            configurations.extend(expand(catalog, preset, revision)?);
        }

        Ok(Self::new(configurations, catalog.video_list(), baseline)?.with_revision(revision.clone()))
    }

    /// Plan from explicit parts; the baseline tag must be one of the configurations.
    ///
    /// Video names and tags must stay distinct once made file-name safe, so
    /// no two acquisitions write the same output file.
    pub fn new(
        configurations: Vec<Configuration>,
        videos: Vec<VideoDescriptor>,
        baseline: impl Into<String>,
    ) -> Result<Self> {
        let baseline = baseline.into();
        if !configurations.iter().any(|c| c.tag == baseline) {
            return Err(Error::Catalog(format!("baseline '{baseline}' is not in the plan")));
        }
        if videos.is_empty() {
            return Err(Error::Catalog("sweep has no videos".to_string()));
        }
        distinct_titles("video", videos.iter().map(|v| v.name.as_str()))?;
        distinct_titles("configuration", configurations.iter().map(|c| c.tag.as_str()))?;
        Ok(Self {
            configurations,
            videos,
            baseline,
            revision: Revision::fixed(Revision::UNKNOWN),
        })
    }

    /// Record `revision` in the run summary.
    #[must_use]
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    /// Restrict the plan to the named videos.
    pub fn retain_videos(&mut self, names: &[String]) -> Result<()> {
        if let Some(missing) = names.iter().find(|n| !self.videos.iter().any(|v| v.name == **n)) {
            return Err(Error::Catalog(format!("unknown video '{missing}'")));
        }
        self.videos.retain(|v| names.contains(&v.name));
        Ok(())
    }

    /// Number of acquisition tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.configurations.iter().map(|c| c.qps.len()).sum::<usize>() * self.videos.len()
    }
}

fn distinct_titles<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for name in names {
        if let Some(other) = seen.insert(sanitize(name), name) {
            return Err(Error::Catalog(format!(
                "{what} '{name}' collides with '{other}' in output file names"
            )));
        }
    }
    Ok(())
}

/// A (configuration, video) pair dropped from the results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skipped {
    /// Video name.
    pub video: String,
    /// Configuration tag.
    pub tag: String,
    /// Failure description.
    pub reason: String,
}

/// Everything a sweep produced.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// Per-sample records, nested by preset, tag and video.
    pub summary: RunSummary,
    /// Per-video and aggregate BD scores.
    pub table: BdTable,
    /// Failures tolerated under [`FailurePolicy::SkipVideo`].
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, Copy)]
struct TaskKey {
    config: usize,
    video: usize,
    qp: i32,
}

/// Run every acquisition of `plan` and score the resulting curves.
pub fn run_sweep(
    plan: &SweepPlan,
    acquirer: &Acquirer,
    pool: &TaskPool,
    options: &SweepOptions,
) -> Result<SweepOutcome> {
    let keys: Vec<TaskKey> = plan
        .configurations
        .iter()
        .enumerate()
        .flat_map(|(ci, config)| {
            (0..plan.videos.len()).flat_map(move |vi| {
                config.qps.iter().map(move |&qp| TaskKey {
                    config: ci,
                    video: vi,
                    qp,
                })
            })
        })
        .collect();

    let results = pool.run("acquire", keys, |key| {
        let config = &plan.configurations[key.config];
        acquirer.acquire(&plan.videos[key.video], key.qp, &config.encoder)
    });

    let mut records: BTreeMap<(usize, usize), Vec<SampleRecord>> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut failed: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (key, result) in results {
        let config = &plan.configurations[key.config];
        let video = &plan.videos[key.video];
        match result {
            Ok(record) => records.entry((key.config, key.video)).or_default().push(record),
            Err(e) => {
                let e = e.for_comparison(&video.name, &config.tag);
                match options.failure {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::SkipVideo => {
                        log::warn!("skipping: {e}");
                        if failed.insert((key.config, key.video)) {
                            skipped.push(Skipped {
                                video: video.name.clone(),
                                tag: config.tag.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    let mut summary = RunSummary::new(plan);
    let mut curves: BTreeMap<usize, BTreeMap<String, Curve>> = BTreeMap::new();
    for ((ci, vi), mut recs) in records {
        let config = &plan.configurations[ci];
        let video = &plan.videos[vi];
        recs.sort_by_key(|r| r.qp);
        if !failed.contains(&(ci, vi)) {
            let curve = recs
                .iter()
                .map(|r| acquirer.sample(r))
                .collect::<Result<Vec<_>>>()
                .and_then(|samples| Curve::with_policy(samples, options.duplicates))
                .map_err(|e| e.for_comparison(&video.name, &config.tag));
            match curve {
                Ok(curve) => {
                    curves.entry(vi).or_default().insert(config.tag.clone(), curve);
                }
                Err(e) if options.failure == FailurePolicy::SkipVideo => {
                    log::warn!("skipping: {e}");
                    failed.insert((ci, vi));
                    skipped.push(Skipped {
                        video: video.name.clone(),
                        tag: config.tag.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        summary.insert(&config.preset, &config.tag, &video.name, recs);
    }

    let skipped_videos: BTreeSet<usize> = failed.iter().map(|&(_, vi)| vi).collect();
    let mut table = BdTable::new(
        match options.reference {
            Reference::Baseline => Some(plan.baseline.clone()),
            Reference::Best => None,
        },
        options.bd.mode,
    );

    for (vi, video_curves) in curves {
        if skipped_videos.contains(&vi) {
            continue;
        }
        let video = &plan.videos[vi].name;
        let scored = match options.reference {
            Reference::Baseline => bd::against_baseline(video, &video_curves, &plan.baseline, &options.bd),
            Reference::Best => {
                bd::relative_to_best(video, &video_curves, options.bd.points, options.bd.low_order)
            }
        };
        match scored {
            Ok(scores) => table.insert_video(video, scores),
            Err(e) if options.failure == FailurePolicy::SkipVideo => {
                log::warn!("skipping: {e}");
                skipped.push(Skipped {
                    video: video.clone(),
                    tag: "*".to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    table.finish();
    if table.videos.is_empty() {
        return Err(Error::Report("no video produced a BD result".to_string()));
    }
    log::info!(
        "sweep finished: {} videos scored, {} skipped",
        table.videos.len(),
        skipped.len()
    );

    Ok(SweepOutcome {
        summary,
        table,
        skipped,
    })
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use crate::acquire::tests::{stub_encoder, stub_metric, video};
    use crate::acquire::{EncoderRecipe, ScratchDir};
    use crate::bd::BdMode;
    use std::path::Path;

    pub(crate) fn configuration(dir: &Path, tag: &str, qps: &[i32], scale: u32) -> Configuration {
        let mut command = stub_encoder(dir);
        if scale != 1000 {
            let script = dir.join(format!("encode_{scale}.sh"));
            std::fs::write(
                &script,
                format!("printf 'x' > \"$output\"\necho $(( (60 - qp) * {scale} ))\n"),
            )
            .unwrap();
            command.args = vec![script.display().to_string()];
        }
        Configuration {
            preset: tag.split('@').next().unwrap_or(tag).to_string(),
            tag: tag.to_string(),
            params: BTreeMap::new(),
            qps: qps.to_vec(),
            encoder: EncoderRecipe {
                tag: tag.to_string(),
                target: "wrenc".to_string(),
                command,
                params: BTreeMap::new(),
                extension: "vvc".to_string(),
            },
        }
    }

    pub(crate) fn acquirer(dir: &Path) -> Acquirer {
        let scratch = ScratchDir::create(Some(&dir.join("scratch")), "sweep", false).unwrap();
        let metrics = BTreeMap::from([("PSNR".to_string(), stub_metric(dir))]);
        Acquirer::new(scratch, metrics, "PSNR", "Avg")
    }

    fn second_video(dir: &Path) -> VideoDescriptor {
        VideoDescriptor {
            name: "other.yuv".to_string(),
            path: dir.join("other.yuv"),
            ..video(dir)
        }
    }

    #[test]
    fn test_sweep_scores_against_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let qps = [22, 27, 32, 37];
        let plan = SweepPlan::new(
            vec![
                configuration(dir.path(), "x265", &qps, 1000),
                configuration(dir.path(), "fast@depth=1", &qps, 900),
            ],
            vec![video(dir.path()), second_video(dir.path())],
            "x265",
        )
        .unwrap();
        assert_eq!(plan.task_count(), 16);

        let pool = TaskPool::new(4).unwrap();
        let outcome = run_sweep(&plan, &acquirer(dir.path()), &pool, &SweepOptions::default()).unwrap();

        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.table.videos.len(), 2);
        assert!((outcome.table.summary["x265"] - 1.0).abs() < 1e-12);
        assert!((outcome.table.summary["fast@depth=1"] - 0.9).abs() < 1e-9);

        let records = &outcome.summary.results["fast"]["fast@depth=1"]["clip.yuv"];
        let qps_seen: Vec<i32> = records.iter().map(|r| r.qp).collect();
        assert_eq!(qps_seen, qps);
    }

    #[test]
    fn test_log_mode_relative_to_best() {
        let dir = tempfile::tempdir().unwrap();
        let qps = [22, 27, 32, 37];
        let plan = SweepPlan::new(
            vec![
                configuration(dir.path(), "x265", &qps, 1000),
                configuration(dir.path(), "fast", &qps, 800),
            ],
            vec![video(dir.path())],
            "x265",
        )
        .unwrap();
        let options = SweepOptions {
            bd: BdOptions::new(50, BdMode::Log),
            reference: Reference::Best,
            ..SweepOptions::default()
        };

        let pool = TaskPool::new(2).unwrap();
        let outcome = run_sweep(&plan, &acquirer(dir.path()), &pool, &options).unwrap();
        assert!((outcome.table.summary["fast"] - 1.0).abs() < 1e-12);
        assert!((outcome.table.summary["x265"] - 1.25).abs() < 1e-9);
        assert!(outcome.table.baseline.is_none());
    }

    #[test]
    fn test_failure_policies() {
        let dir = tempfile::tempdir().unwrap();
        let qps = [22, 27, 32, 37];
        let mut broken = configuration(dir.path(), "broken", &qps, 1000);
        let script = dir.path().join("broken.sh");
        std::fs::write(&script, "[ \"$qp\" = 32 ] && exit 2\necho 100\n").unwrap();
        broken.encoder.command.args = vec![script.display().to_string()];

        let plan = SweepPlan::new(
            vec![configuration(dir.path(), "x265", &qps, 1000), broken],
            vec![video(dir.path())],
            "x265",
        )
        .unwrap();
        let pool = TaskPool::new(2).unwrap();

        let err = run_sweep(&plan, &acquirer(dir.path()), &pool, &SweepOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Comparison { ref tag, .. } if tag == "broken"));

        let options = SweepOptions {
            failure: FailurePolicy::SkipVideo,
            ..SweepOptions::default()
        };
        // The only video is skipped, so nothing is left to report.
        let err = run_sweep(&plan, &acquirer(dir.path()), &pool, &options).unwrap_err();
        assert!(matches!(err, Error::Report(_)));
    }

    #[test]
    fn test_skip_video_keeps_other_videos() {
        let dir = tempfile::tempdir().unwrap();
        let qps = [22, 27, 32, 37];
        let mut flaky = configuration(dir.path(), "fast", &qps, 1000);
        let script = dir.path().join("flaky.sh");
        std::fs::write(
            &script,
            "case \"$input\" in *other*) exit 1;; esac\nprintf 'x' > \"$output\"\necho $(( (60 - qp) * 950 ))\n",
        )
        .unwrap();
        flaky.encoder.command.args = vec![script.display().to_string()];

        let plan = SweepPlan::new(
            vec![configuration(dir.path(), "x265", &qps, 1000), flaky],
            vec![video(dir.path()), second_video(dir.path())],
            "x265",
        )
        .unwrap();
        let options = SweepOptions {
            failure: FailurePolicy::SkipVideo,
            ..SweepOptions::default()
        };
        let pool = TaskPool::new(4).unwrap();
        let outcome = run_sweep(&plan, &acquirer(dir.path()), &pool, &options).unwrap();

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].video, "other.yuv");
        assert_eq!(outcome.table.videos.len(), 1);
        assert!(outcome.table.videos.contains_key("clip.yuv"));
        assert!((outcome.table.summary["fast"] - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_plan_requires_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let result = SweepPlan::new(
            vec![configuration(dir.path(), "fast", &[22, 27], 1000)],
            vec![video(dir.path())],
            "x265",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_rejects_colliding_titles() {
        let dir = tempfile::tempdir().unwrap();
        let qps = [22, 27];
        let spaced = VideoDescriptor {
            name: "clip one.yuv".to_string(),
            ..video(dir.path())
        };
        let underscored = VideoDescriptor {
            name: "clip_one.yuv".to_string(),
            ..video(dir.path())
        };
        let err = SweepPlan::new(
            vec![configuration(dir.path(), "x265", &qps, 1000)],
            vec![spaced, underscored],
            "x265",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Catalog(ref m) if m.contains("collides")));

        let result = SweepPlan::new(
            vec![
                configuration(dir.path(), "x265", &qps, 1000),
                configuration(dir.path(), "fast@mode=a b", &qps, 1000),
                configuration(dir.path(), "fast@mode=a_b", &qps, 1000),
            ],
            vec![video(dir.path())],
            "x265",
        );
        assert!(result.is_err());

        let plan = SweepPlan::new(
            vec![configuration(dir.path(), "x265", &qps, 1000)],
            vec![
                VideoDescriptor {
                    name: "clip.420.yuv".to_string(),
                    ..video(dir.path())
                },
                VideoDescriptor {
                    name: "clip.444.yuv".to_string(),
                    ..video(dir.path())
                },
            ],
            "x265",
        );
        assert!(plan.is_ok());
    }

    #[test]
    fn test_plan_from_catalog() {
        let dir = tempfile::tempdir().unwrap();
        crate::catalog::tests::write_catalog(dir.path());
        let catalog = Catalog::load(dir.path()).unwrap();

        let mut plan =
            SweepPlan::from_catalog(&catalog, &catalog.config.default_presets, &Revision::fixed("r1"))
                .unwrap();
        assert_eq!(plan.baseline, "x265");
        let tags: Vec<&str> = plan.configurations.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, ["x265", "fast#r1@depth=1", "fast#r1@depth=2"]);

        plan.retain_videos(&["b.yuv".to_string()]).unwrap();
        assert_eq!(plan.videos.len(), 1);
        assert!(plan.retain_videos(&["zzz.yuv".to_string()]).is_err());
    }
}
