//! Quality metric registry entries.

use serde::{Deserialize, Serialize};

use super::preset::CommandRecipe;

/// How a metric tool reports its scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// JSON array with one record per frame.
    PerFrame,
    /// One record for the whole video.
    #[serde(other)]
    Single,
}

/// One entry of `metrics.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metric tool invocation.
    pub command: CommandRecipe,
    /// Output shape.
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// Attributes to average (e.g. `Y`, `U`, `V`, `Avg`).
    #[serde(default)]
    pub attr: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_spec_parse() {
        let spec: MetricSpec = serde_json::from_str(
            r#"{"command": "psnr.sh", "type": "per_frame", "attr": ["Y", "Avg"]}"#,
        )
        .unwrap();
        assert_eq!(spec.kind, MetricKind::PerFrame);
        assert_eq!(spec.attr, ["Y", "Avg"]);

        let single: MetricSpec =
            serde_json::from_str(r#"{"command": "vmaf.sh", "type": "summary"}"#).unwrap();
        assert_eq!(single.kind, MetricKind::Single);
        assert!(single.attr.is_empty());
    }
}
