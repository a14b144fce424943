//! Sweep results and their JSON/CSV files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::SweepPlan;
use crate::acquire::SampleRecord;
use crate::bd::BdMode;
use crate::error::Result;
use crate::stats::mean;

/// Timestamp format of [`RunSummary::date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Every sample of a sweep: preset → tag → video → records by QP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Local time the sweep finished.
    pub date: String,
    /// Revision of the candidate encoder.
    pub commit_id: String,
    /// Subject line of that revision.
    pub commit_message: String,
    /// Baseline configuration tag.
    pub baseline: String,
    /// Nested sample records.
    pub results: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<SampleRecord>>>>,
}

impl RunSummary {
    /// Empty summary stamped with the current local time.
    #[must_use]
    pub fn new(plan: &SweepPlan) -> Self {
        Self {
            date: chrono::Local::now().format(DATE_FORMAT).to_string(),
            commit_id: plan.revision.id.clone(),
            commit_message: plan.revision.message.clone(),
            baseline: plan.baseline.clone(),
            results: BTreeMap::new(),
        }
    }

    /// Record one curve's samples.
    pub fn insert(&mut self, preset: &str, tag: &str, video: &str, records: Vec<SampleRecord>) {
        self.results
            .entry(preset.to_string())
            .or_default()
            .entry(tag.to_string())
            .or_default()
            .insert(video.to_string(), records);
    }

    /// Write as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_pretty(path, self)
    }
}

/// BD scores per video and their mean per tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BdTable {
    /// Baseline tag, or `None` when scored relative to the best configuration.
    pub baseline: Option<String>,
    /// Reduction mode.
    pub mode: BdMode,
    /// Video → tag → score.
    pub videos: BTreeMap<String, BTreeMap<String, f64>>,
    /// Tag → mean score across videos.
    pub summary: BTreeMap<String, f64>,
}

impl BdTable {
    /// Name of the aggregate row in the CSV file.
    pub const SUMMARY_ROW: &'static str = "summary";

    /// Empty table.
    #[must_use]
    pub fn new(baseline: Option<String>, mode: BdMode) -> Self {
        Self {
            baseline,
            mode,
            videos: BTreeMap::new(),
            summary: BTreeMap::new(),
        }
    }

    /// Add one video's scores.
    pub fn insert_video(&mut self, video: &str, scores: BTreeMap<String, f64>) {
        self.videos.insert(video.to_string(), scores);
    }

    /// Recompute the per-tag means.
    pub fn finish(&mut self) {
        let mut by_tag: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for scores in self.videos.values() {
            for (tag, &score) in scores {
                by_tag.entry(tag).or_default().push(score);
            }
        }
        self.summary = by_tag
            .into_iter()
            .map(|(tag, scores)| (tag.to_string(), mean(&scores)))
            .collect();
    }

    /// Tags ordered from best (lowest mean) to worst.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut rows: Vec<(&str, f64)> = self.summary.iter().map(|(t, &v)| (t.as_str(), v)).collect();
        rows.sort_by(|a, b| a.1.total_cmp(&b.1));
        rows
    }

    /// Write as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_pretty(path, self)
    }

    /// Write `video,tag,bd` rows, aggregate rows last.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["video", "tag", "bd"])?;
        for (video, scores) in &self.videos {
            for (tag, score) in scores {
                wtr.write_record([video.as_str(), tag.as_str(), &format!("{score:.6}")])?;
            }
        }
        for (tag, score) in &self.summary {
            wtr.write_record([Self::SUMMARY_ROW, tag.as_str(), &format!("{score:.6}")])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BdTable {
        let mut table = BdTable::new(Some("x265".to_string()), BdMode::Ratio);
        table.insert_video(
            "a.yuv",
            BTreeMap::from([("x265".to_string(), 1.0), ("fast".to_string(), 0.9)]),
        );
        table.insert_video(
            "b.yuv",
            BTreeMap::from([("x265".to_string(), 1.0), ("fast".to_string(), 0.8)]),
        );
        table.finish();
        table
    }

    #[test]
    fn test_summary_means() {
        let table = table();
        assert!((table.summary["fast"] - 0.85).abs() < 1e-12);
        assert_eq!(table.summary["x265"], 1.0);
        assert_eq!(table.ranked()[0].0, "fast");
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("bd_table.csv");
        table().write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "video,tag,bd");
        assert_eq!(lines[1], "a.yuv,fast,0.900000");
        assert_eq!(lines.len(), 1 + 4 + 2);
        assert_eq!(lines[5], "summary,fast,0.850000");
    }

    #[test]
    fn test_write_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bd_table.json");
        table().write_json(&path).unwrap();

        let loaded: BdTable = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.baseline.as_deref(), Some("x265"));
        assert_eq!(loaded.videos.len(), 2);
        assert_eq!(loaded.mode, BdMode::Ratio);
    }
}
