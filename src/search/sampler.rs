//! Trial proposal strategies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::space::{ParamSpec, ParameterVector, SearchSpace};
use super::study::{Direction, Trial};
use crate::catalog::ParamValue;

/// How the next parameter vector is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Sampler {
    /// Independent uniform draws.
    Random,
    /// Uniform draws for the first trials, then perturbations around the
    /// best trial with a radius that shrinks as trials complete.
    Local {
        /// Completed trials before local search starts.
        startup_trials: usize,
        /// Initial radius as a fraction of each parameter's range.
        initial_radius: f64,
        /// Radius multiplier per completed trial after startup.
        decay: f64,
    },
}

impl Default for Sampler {
    fn default() -> Self {
        Self::Local {
            startup_trials: 10,
            initial_radius: 0.25,
            decay: 0.97,
        }
    }
}

/// Smallest perturbation radius, as a fraction of the range.
const MIN_RADIUS: f64 = 0.01;

/// RNG for trial `number` of a study seeded with `seed`.
///
/// Depends only on the pair, so a resumed study draws what an uninterrupted
/// one would have.
#[must_use]
pub fn trial_rng(seed: u64, number: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (number as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

impl Sampler {
    /// Propose the parameters of trial `number` given the history so far.
    #[must_use]
    pub fn propose(
        &self,
        space: &SearchSpace,
        history: &[Trial],
        direction: Direction,
        seed: u64,
        number: usize,
    ) -> ParameterVector {
        let mut rng = trial_rng(seed, number);
        match *self {
            Self::Random => uniform(space, &mut rng),
            Self::Local {
                startup_trials,
                initial_radius,
                decay,
            } => {
                let completed = history.iter().filter(|t| t.value().is_some()).count();
                match direction.best(history) {
                    Some(best) if completed >= startup_trials => {
                        let steps = (completed - startup_trials) as i32;
                        let radius = (initial_radius * decay.powi(steps)).max(MIN_RADIUS);
                        perturb(space, &best.params, radius, &mut rng)
                    }
                    _ => uniform(space, &mut rng),
                }
            }
        }
    }
}

fn uniform(space: &SearchSpace, rng: &mut StdRng) -> ParameterVector {
    let mut params = ParameterVector::new();
    for spec in &space.parameters {
        let value = match *spec {
            ParamSpec::Float { low, high, .. } => ParamValue::Float(rng.random_range(low..=high)),
            ParamSpec::Int { low, high, .. } => ParamValue::Int(rng.random_range(low..=high)),
        };
        params.push(spec.name(), value);
    }
    params
}

fn perturb(space: &SearchSpace, center: &ParameterVector, radius: f64, rng: &mut StdRng) -> ParameterVector {
    let mut params = ParameterVector::new();
    for spec in &space.parameters {
        let (low, high) = spec.bounds();
        let value = match center.get_f64(spec.name()) {
            Some(c) => {
                let step = rng.random_range(-1.0..=1.0) * radius * (high - low);
                spec.value_at(c + step)
            }
            // Parameter added since the best trial ran.
            None => spec.value_at(rng.random_range(low..=high)),
        };
        params.push(spec.name(), value);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::study::TrialState;

    fn space() -> SearchSpace {
        SearchSpace::new(vec![
            ParamSpec::float("p0", 1.5, 1.6),
            ParamSpec::int("depth", 1, 4),
        ])
        .unwrap()
    }

    fn in_bounds(space: &SearchSpace, params: &ParameterVector) -> bool {
        space.parameters.iter().all(|spec| {
            let (low, high) = spec.bounds();
            params
                .get_f64(spec.name())
                .is_some_and(|v| v >= low && v <= high)
        })
    }

    #[test]
    fn test_random_is_seeded_per_trial() {
        let space = space();
        let a = Sampler::Random.propose(&space, &[], Direction::Minimize, 7, 3);
        let b = Sampler::Random.propose(&space, &[], Direction::Minimize, 7, 3);
        let c = Sampler::Random.propose(&space, &[], Direction::Minimize, 7, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(in_bounds(&space, &a));
        assert!(matches!(a.get("depth"), Some(ParamValue::Int(_))));
    }

    #[test]
    fn test_local_perturbs_around_best() {
        let space = space();
        let mut best = ParameterVector::new();
        best.push("p0", ParamValue::Float(1.55));
        best.push("depth", ParamValue::Int(2));
        let history = vec![
            Trial::new(0, best.clone(), TrialState::Complete { value: 0.9 }),
            Trial::new(
                1,
                best.clone(),
                TrialState::Failed {
                    reason: "encoder crashed".to_string(),
                },
            ),
        ];
        let sampler = Sampler::Local {
            startup_trials: 1,
            initial_radius: 0.1,
            decay: 1.0,
        };

        for number in 2..50 {
            let params = sampler.propose(&space, &history, Direction::Minimize, 1, number);
            assert!(in_bounds(&space, &params));
            let p0 = params.get_f64("p0").unwrap();
            assert!((p0 - 1.55).abs() <= 0.1 * 0.1 + 1e-12);
            let depth = params.get_f64("depth").unwrap();
            assert!((depth - 2.0).abs() <= 1.0);
        }
    }

    #[test]
    fn test_local_startup_is_uniform() {
        let space = space();
        let sampler = Sampler::default();
        let params = sampler.propose(&space, &[], Direction::Minimize, 1, 0);
        assert_eq!(params, Sampler::Random.propose(&space, &[], Direction::Minimize, 1, 0));
    }
}
