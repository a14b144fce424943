//! Black-box parameter search over encoder tuning parameters.
//!
//! Each trial proposes a [`ParameterVector`], serializes it into the encoder's
//! extra-parameter string, evaluates it with an [`Objective`] and records the
//! outcome in a [`Study`]. Failed evaluations are recorded as failures and
//! never compete for best.
//!
//! ```
//! use rd_eval::search::{Direction, ParamSpec, Sampler, SearchSpace, Study, optimize};
//!
//! let space = SearchSpace::new(vec![ParamSpec::float("p0", 0.0, 4.0)])?;
//! let mut study = Study::new("demo", Direction::Minimize, 1);
//! let mut objective = |p: &rd_eval::search::ParameterVector| {
//!     let x = p.get_f64("p0").unwrap_or_default();
//!     Ok::<f64, rd_eval::Error>((x - 1.5).powi(2))
//! };
//!
//! let best = optimize(&mut study, &space, &Sampler::default(), &mut objective, 40)?;
//! assert!(best.value().unwrap() < 0.25);
//! # Ok::<(), rd_eval::Error>(())
//! ```

mod sampler;
mod space;
mod study;

pub use sampler::{Sampler, trial_rng};
pub use space::{ParamSpec, ParameterVector, SearchSpace};
pub use study::{Direction, Study, Trial, TrialState};

use std::collections::BTreeMap;

use chrono::Utc;

use crate::acquire::Acquirer;
use crate::catalog::{Catalog, ParamValue, VideoDescriptor};
use crate::error::{Error, Result};
use crate::pool::TaskPool;
use crate::sweep::{Configuration, HeadToHead, ReferenceProfile, Revision, SweepOptions};

/// Something that scores a parameter vector.
pub trait Objective {
    /// Evaluate one parameter vector.
    fn evaluate(&mut self, params: &ParameterVector) -> Result<f64>;
}

impl<F> Objective for F
where
    F: FnMut(&ParameterVector) -> Result<f64>,
{
    fn evaluate(&mut self, params: &ParameterVector) -> Result<f64> {
        self(params)
    }
}

/// Run `n_trials` more trials and return the study's best trial.
///
/// Fails only if no trial in the whole study has completed.
pub fn optimize<'s>(
    study: &'s mut Study,
    space: &SearchSpace,
    sampler: &Sampler,
    objective: &mut dyn Objective,
    n_trials: usize,
) -> Result<&'s Trial> {
    for _ in 0..n_trials {
        let number = study.next_number();
        let params = sampler.propose(space, &study.trials, study.direction, study.seed, number);
        log::debug!("trial {number}: {params}");

        let started_at = Utc::now();
        let state = match objective.evaluate(&params) {
            Ok(value) if value.is_finite() => TrialState::Complete { value },
            Ok(value) => TrialState::Failed {
                reason: format!("non-finite objective value {value}"),
            },
            Err(e) => TrialState::Failed {
                reason: e.to_string(),
            },
        };

        match &state {
            TrialState::Complete { value } => log::info!("trial {number} finished with value {value}"),
            TrialState::Failed { reason } => log::warn!("trial {number} failed: {reason}"),
        }

        study.record(Trial {
            number,
            params,
            state,
            started_at,
            finished_at: Utc::now(),
        })?;

        if let Some(best) = study.best() {
            log::info!("best is trial {} with value {:?}", best.number, best.value());
        }
    }

    study
        .best()
        .ok_or_else(|| Error::Search(format!("no completed trial in study '{}'", study.name)))
}

/// Objective that encodes with the candidate preset under test and returns
/// its mean BD score against a reference encoder.
///
/// A trial that lost any video (under [`FailurePolicy::SkipVideo`]) is an
/// error, never a loss.
///
/// [`FailurePolicy::SkipVideo`]: crate::sweep::FailurePolicy::SkipVideo
pub struct SweepObjective<'a> {
    catalog: &'a Catalog,
    acquirer: &'a Acquirer,
    pool: &'a TaskPool,
    candidate_preset: String,
    param_name: String,
    fixed: BTreeMap<String, ParamValue>,
    reference: Configuration,
    profile: ReferenceProfile,
    videos: Vec<VideoDescriptor>,
    options: SweepOptions,
    revision: Revision,
}

impl<'a> SweepObjective<'a> {
    /// Objective for `candidate_preset`; the trial vector is passed as
    /// `param_name` (usually `extra_params`).
    ///
    /// Other swept parameters of the candidate preset are fixed to their
    /// first listed value.
    pub fn new(
        catalog: &'a Catalog,
        acquirer: &'a Acquirer,
        pool: &'a TaskPool,
        candidate_preset: &str,
        param_name: &str,
        profile: ReferenceProfile,
    ) -> Result<Self> {
        let preset = catalog.preset(candidate_preset)?;
        let fixed = preset
            .swept_parameters()
            .filter(|(name, _)| *name != param_name)
            .filter_map(|(name, values)| values.first().map(|v| (name.clone(), v.clone())))
            .collect();
        let revision = Revision::detect(catalog.root());
        let reference = Configuration::new(catalog, &profile.name, BTreeMap::new(), &revision)?;
        Ok(Self {
            catalog,
            acquirer,
            pool,
            candidate_preset: candidate_preset.to_string(),
            param_name: param_name.to_string(),
            fixed,
            reference,
            profile,
            videos: catalog.video_list(),
            options: SweepOptions::default(),
            revision,
        })
    }

    /// Sweep options used for each evaluation.
    #[must_use]
    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    /// Restrict evaluation to some videos.
    #[must_use]
    pub fn with_videos(mut self, videos: Vec<VideoDescriptor>) -> Self {
        self.videos = videos;
        self
    }
}

impl Objective for SweepObjective<'_> {
    fn evaluate(&mut self, params: &ParameterVector) -> Result<f64> {
        let mut config = self.fixed.clone();
        config.insert(self.param_name.clone(), ParamValue::Text(params.to_string()));
        let candidate = Configuration::new(self.catalog, &self.candidate_preset, config, &self.revision)?;

        let h2h = HeadToHead {
            candidate,
            reference: self.reference.clone(),
            profile: self.profile.clone(),
        };
        let (result, outcome) = h2h.compare(self.videos.clone(), self.acquirer, self.pool, &self.options)?;
        // A mean over the surviving videos is not comparable with other trials.
        if !outcome.skipped.is_empty() {
            let skipped: Vec<String> = outcome
                .skipped
                .iter()
                .map(|s| format!("{} [{}]", s.video, s.tag))
                .collect();
            return Err(Error::Search(format!("skipped {}", skipped.join(", "))));
        }
        Ok(result.mean)
    }
}
