//! Trial history persisted as JSON.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::space::ParameterVector;
use crate::error::{Error, Result};

/// Whether lower or higher objective values are better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Lower is better.
    #[default]
    Minimize,
    /// Higher is better.
    Maximize,
}

impl Direction {
    /// Whether `a` is strictly better than `b`.
    #[must_use]
    pub fn better(self, a: f64, b: f64) -> bool {
        match self {
            Self::Minimize => a < b,
            Self::Maximize => a > b,
        }
    }

    /// Best completed trial; failed trials never qualify.
    #[must_use]
    pub fn best(self, trials: &[Trial]) -> Option<&Trial> {
        trials
            .iter()
            .filter(|t| t.value().is_some())
            .reduce(|best, t| match (t.value(), best.value()) {
                (Some(v), Some(b)) if self.better(v, b) => t,
                _ => best,
            })
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimize => write!(f, "minimize"),
            Self::Maximize => write!(f, "maximize"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimize" | "min" => Ok(Self::Minimize),
            "maximize" | "max" => Ok(Self::Maximize),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Outcome of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrialState {
    /// The objective returned a finite value.
    Complete {
        /// Objective value.
        value: f64,
    },
    /// The objective could not be evaluated.
    Failed {
        /// Failure description.
        reason: String,
    },
}

/// One evaluated parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Zero-based trial number within the study.
    pub number: usize,
    /// Parameters evaluated.
    pub params: ParameterVector,
    /// Outcome.
    #[serde(flatten)]
    pub state: TrialState,
    /// When evaluation started.
    pub started_at: DateTime<Utc>,
    /// When evaluation finished.
    pub finished_at: DateTime<Utc>,
}

impl Trial {
    /// Trial stamped with the current time.
    #[must_use]
    pub fn new(number: usize, params: ParameterVector, state: TrialState) -> Self {
        let now = Utc::now();
        Self {
            number,
            params,
            state,
            started_at: now,
            finished_at: now,
        }
    }

    /// Objective value of a completed trial.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self.state {
            TrialState::Complete { value } if value.is_finite() => Some(value),
            _ => None,
        }
    }
}

/// A named, resumable sequence of trials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    /// Study name.
    pub name: String,
    /// Optimization direction.
    pub direction: Direction,
    /// Sampler seed.
    pub seed: u64,
    /// Trials in the order they ran.
    pub trials: Vec<Trial>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Study {
    /// In-memory study.
    #[must_use]
    pub fn new(name: impl Into<String>, direction: Direction, seed: u64) -> Self {
        Self {
            name: name.into(),
            direction,
            seed,
            trials: Vec::new(),
            path: None,
        }
    }

    /// Open the study stored at `path`, or start a new one there.
    ///
    /// An existing study must have the same name and direction. Its stored
    /// seed wins over `seed`.
    pub fn open(path: &Path, name: &str, direction: Direction, seed: u64) -> Result<Self> {
        if !path.exists() {
            let mut study = Self::new(name, direction, seed);
            study.path = Some(path.to_path_buf());
            return Ok(study);
        }

        let text = std::fs::read_to_string(path)?;
        let mut study: Self = serde_json::from_str(&text)?;
        if study.name != name {
            return Err(Error::Search(format!(
                "{} holds study '{}', not '{name}'",
                path.display(),
                study.name
            )));
        }
        if study.direction != direction {
            return Err(Error::Search(format!(
                "study '{name}' was created to {}, not {direction}",
                study.direction
            )));
        }
        if study.seed != seed {
            log::warn!("study '{name}' keeps its stored seed {}", study.seed);
        }
        log::info!("resuming study '{name}' after {} trials", study.trials.len());
        study.path = Some(path.to_path_buf());
        Ok(study)
    }

    /// Number the next trial will get.
    #[must_use]
    pub fn next_number(&self) -> usize {
        self.trials.iter().map(|t| t.number + 1).max().unwrap_or(0)
    }

    /// Best completed trial.
    #[must_use]
    pub fn best(&self) -> Option<&Trial> {
        self.direction.best(&self.trials)
    }

    /// Append a trial and persist the study if it has a file.
    pub fn record(&mut self, trial: Trial) -> Result<()> {
        self.trials.push(trial);
        self.save()
    }

    /// Write the study to its file, if any.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParamValue;

    fn params(p0: f64) -> ParameterVector {
        let mut v = ParameterVector::new();
        v.push("p0", ParamValue::Float(p0));
        v
    }

    #[test]
    fn test_best_ignores_failures_and_non_finite() {
        let trials = vec![
            Trial::new(0, params(1.0), TrialState::Complete { value: 0.95 }),
            Trial::new(
                1,
                params(1.1),
                TrialState::Failed {
                    reason: "timeout".to_string(),
                },
            ),
            Trial::new(2, params(1.2), TrialState::Complete { value: f64::NAN }),
            Trial::new(3, params(1.3), TrialState::Complete { value: 0.91 }),
            Trial::new(4, params(1.4), TrialState::Complete { value: 0.93 }),
        ];
        assert_eq!(Direction::Minimize.best(&trials).unwrap().number, 3);
        assert_eq!(Direction::Maximize.best(&trials).unwrap().number, 0);

        let failed_only = &trials[1..3];
        assert!(Direction::Minimize.best(failed_only).is_none());
    }

    #[test]
    fn test_resume_continues_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.json");

        let mut study = Study::open(&path, "bd", Direction::Minimize, 42).unwrap();
        study
            .record(Trial::new(study.next_number(), params(1.5), TrialState::Complete { value: 0.9 }))
            .unwrap();
        study
            .record(Trial::new(
                study.next_number(),
                params(1.6),
                TrialState::Failed {
                    reason: "encoder exited with 1".to_string(),
                },
            ))
            .unwrap();

        let resumed = Study::open(&path, "bd", Direction::Minimize, 7).unwrap();
        assert_eq!(resumed.seed, 42);
        assert_eq!(resumed.trials.len(), 2);
        assert_eq!(resumed.next_number(), 2);
        assert_eq!(resumed.best().unwrap().number, 0);
        assert!(matches!(resumed.trials[1].state, TrialState::Failed { .. }));
    }

    #[test]
    fn test_direction_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.json");
        Study::open(&path, "bd", Direction::Minimize, 1)
            .unwrap()
            .save()
            .unwrap();

        assert!(Study::open(&path, "bd", Direction::Maximize, 1).is_err());
        assert!(Study::open(&path, "other", Direction::Minimize, 1).is_err());
    }

    #[test]
    fn test_trial_json_shape() {
        let trial = Trial::new(5, params(1.5), TrialState::Complete { value: 0.9 });
        let json: serde_json::Value = serde_json::to_value(&trial).unwrap();
        assert_eq!(json["state"], "complete");
        assert_eq!(json["value"], 0.9);
        assert_eq!(json["number"], 5);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("MIN".parse::<Direction>().unwrap(), Direction::Minimize);
        assert_eq!("maximize".parse::<Direction>().unwrap(), Direction::Maximize);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
