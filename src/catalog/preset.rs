//! Encoder presets and the values their parameters range over.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A parameter value as written in `presets.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer value (QP, split depth, ...).
    Int(i64),
    /// Real value.
    Float(f64),
    /// Free-form value (preset names, extra parameter strings).
    Text(String),
}

impl ParamValue {
    /// Integer view, if the value is integral.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Float(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// An executable plus its argument template.
///
/// Written in catalogs as one whitespace-separated string, e.g.
/// `"encode_x265.sh --tune psnr"`. Arguments may contain `{name}`
/// placeholders filled in per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandRecipe {
    /// Program to run.
    pub program: PathBuf,
    /// Argument templates.
    pub args: Vec<String>,
}

impl CommandRecipe {
    /// Split a command line on whitespace.
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Catalog("empty command".to_string()))?;
        Ok(Self {
            program: PathBuf::from(program),
            args: parts.map(str::to_string).collect(),
        })
    }

    /// Resolve a relative program against the catalog directory.
    ///
    /// Bare program names that do not exist there are left for `PATH` lookup.
    #[must_use]
    pub fn resolved(&self, root: &Path) -> Self {
        let program = if self.program.is_relative() {
            let local = root.join(&self.program);
            if self.program.components().count() > 1 || local.exists() {
                local
            } else {
                self.program.clone()
            }
        } else {
            self.program.clone()
        };
        Self {
            program,
            args: self.args.clone(),
        }
    }

    /// Display name used in error messages and logs.
    #[must_use]
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl TryFrom<String> for CommandRecipe {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CommandRecipe> for String {
    fn from(recipe: CommandRecipe) -> Self {
        std::iter::once(recipe.program.display().to_string())
            .chain(recipe.args)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One entry of `presets.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    /// Name of the swept quantization axis (usually `qp`).
    pub base: String,
    /// Target codec tag passed to the metric tool (`wrenc`, `x265`, ...).
    pub target: String,
    /// Encoder invocation.
    pub command: CommandRecipe,
    /// Value lists per parameter, including the base axis.
    #[serde(default)]
    pub parameters: BTreeMap<String, Vec<ParamValue>>,
    /// Command-line flag prepended to a parameter's value, e.g.
    /// `extra_params → --extra-params`.
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
    /// Marks the encoder under development; its tags carry the revision id.
    #[serde(default)]
    pub candidate: bool,
    /// Extension of the compressed output file.
    #[serde(default)]
    pub extension: Option<String>,
}

impl Preset {
    /// QP values of the base axis.
    pub fn base_values(&self) -> Result<Vec<i32>> {
        let values = self
            .parameters
            .get(&self.base)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Catalog(format!("no values for base axis '{}'", self.base)))?;
        values
            .iter()
            .map(|v| {
                v.as_int()
                    .and_then(|i| i32::try_from(i).ok())
                    .ok_or_else(|| Error::Catalog(format!("non-integer {} value {v}", self.base)))
            })
            .collect()
    }

    /// Non-base parameters with at least one value, in name order.
    pub fn swept_parameters(&self) -> impl Iterator<Item = (&String, &Vec<ParamValue>)> {
        self.parameters
            .iter()
            .filter(move |(name, values)| **name != self.base && !values.is_empty())
    }

    /// Render a parameter as the encoder sees it, applying its flag if any.
    #[must_use]
    pub fn render_param(&self, name: &str, value: &ParamValue) -> String {
        match self.flags.get(name) {
            Some(flag) => format!("{flag} {value}"),
            None => value.to_string(),
        }
    }

    /// Output file extension.
    #[must_use]
    pub fn output_extension(&self) -> &str {
        self.extension
            .as_deref()
            .unwrap_or(if self.candidate { "vvc" } else { "mp4" })
    }
}
