//! Search spaces and the parameter vectors drawn from them.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::ParamValue;
use crate::error::{Error, Result};

/// One tunable parameter and its inclusive bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamSpec {
    /// Real-valued parameter.
    Float {
        /// Parameter name.
        name: String,
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Integer parameter.
    Int {
        /// Parameter name.
        name: String,
        /// Lower bound.
        low: i64,
        /// Upper bound.
        high: i64,
    },
}

impl ParamSpec {
    /// Real-valued parameter on `[low, high]`.
    #[must_use]
    pub fn float(name: &str, low: f64, high: f64) -> Self {
        Self::Float {
            name: name.to_string(),
            low,
            high,
        }
    }

    /// Integer parameter on `[low, high]`.
    #[must_use]
    pub fn int(name: &str, low: i64, high: i64) -> Self {
        Self::Int {
            name: name.to_string(),
            low,
            high,
        }
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Float { name, .. } | Self::Int { name, .. } => name,
        }
    }

    /// Bounds as reals.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Self::Float { low, high, .. } => (low, high),
            Self::Int { low, high, .. } => (low as f64, high as f64),
        }
    }

    /// Map a real value into this parameter's domain: clamp, and round for
    /// integers.
    #[must_use]
    pub fn value_at(&self, x: f64) -> ParamValue {
        match *self {
            Self::Float { low, high, .. } => ParamValue::Float(x.clamp(low, high)),
            Self::Int { low, high, .. } => ParamValue::Int((x.round() as i64).clamp(low, high)),
        }
    }

    fn validate(&self) -> Result<()> {
        let (low, high) = self.bounds();
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(Error::Search(format!(
                "parameter '{}' has invalid bounds [{low}, {high}]",
                self.name()
            )));
        }
        Ok(())
    }
}

/// Ordered list of tunable parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    /// Parameters in serialization order.
    pub parameters: Vec<ParamSpec>,
}

impl SearchSpace {
    /// Validated space.
    pub fn new(parameters: Vec<ParamSpec>) -> Result<Self> {
        if parameters.is_empty() {
            return Err(Error::Search("search space is empty".to_string()));
        }
        let mut names = std::collections::BTreeSet::new();
        for spec in &parameters {
            spec.validate()?;
            if !names.insert(spec.name()) {
                return Err(Error::Search(format!("duplicate parameter '{}'", spec.name())));
            }
        }
        Ok(Self { parameters })
    }

    /// Load a space from a JSON file.
    ///
    /// ```json
    /// {"parameters": [{"type": "float", "name": "p0", "low": 1.5, "high": 1.6}]}
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::CatalogFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let space: Self = serde_json::from_str(&text).map_err(|e| Error::CatalogFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::new(space.parameters)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the space has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Parameter values of one trial, in search-space order.
///
/// Displays as `name=value` pairs joined by commas, the form encoders take
/// as their extra-parameter string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector {
    values: Vec<(String, ParamValue)>,
}

impl ParameterVector {
    /// Empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn push(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.push((name.into(), value));
    }

    /// Value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Real view of a parameter's value.
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(s) => s.parse().ok(),
        }
    }

    /// `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_display_keeps_space_order() {
        let mut v = ParameterVector::new();
        v.push("p1", ParamValue::Float(1.88));
        v.push("p0", ParamValue::Float(1.5874337195318615));
        v.push("depth", ParamValue::Int(3));
        assert_eq!(v.to_string(), "p1=1.88,p0=1.5874337195318615,depth=3");
        assert_eq!(v.get_f64("depth"), Some(3.0));
        assert!(v.get("q0").is_none());
    }

    #[test]
    fn test_value_at_clamps_and_rounds() {
        assert_eq!(ParamSpec::float("p0", 1.5, 1.6).value_at(2.0), ParamValue::Float(1.6));
        assert_eq!(ParamSpec::int("d", 1, 4).value_at(2.6), ParamValue::Int(3));
        assert_eq!(ParamSpec::int("d", 1, 4).value_at(-7.0), ParamValue::Int(1));
    }

    #[test]
    fn test_space_validation() {
        assert!(SearchSpace::new(vec![]).is_err());
        assert!(SearchSpace::new(vec![ParamSpec::float("p0", 2.0, 1.0)]).is_err());
        assert!(
            SearchSpace::new(vec![ParamSpec::float("p0", 1.0, 2.0), ParamSpec::int("p0", 1, 2)]).is_err()
        );
    }

    #[test]
    fn test_load_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("space.json");
        std::fs::write(
            &path,
            r#"{"parameters": [
                {"type": "float", "name": "p0", "low": 1.5, "high": 1.6},
                {"type": "int", "name": "depth", "low": 1, "high": 4}
            ]}"#,
        )
        .unwrap();

        let space = SearchSpace::load(&path).unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.parameters[1], ParamSpec::int("depth", 1, 4));
    }

    #[test]
    fn test_vector_json_round_trip() {
        let mut v = ParameterVector::new();
        v.push("p0", ParamValue::Float(1.55));
        v.push("depth", ParamValue::Int(2));
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"[["p0",1.55],["depth",2]]"#);
        let back: ParameterVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
