//! Evaluation catalogs: videos, metrics, presets and run defaults.
//!
//! A catalog is a directory holding four JSON files:
//!
//! - `config.json`: default presets, the baseline preset, asset location
//! - `videos.json`: test videos keyed by file name
//! - `metrics.json`: quality metric tools keyed by metric name
//! - `presets.json`: encoder presets keyed by preset name
//!
//! Commands inside the catalog are resolved relative to its directory.

mod metric;
mod preset;
mod video;

pub use metric::{MetricKind, MetricSpec};
pub use preset::{CommandRecipe, ParamValue, Preset};
pub use video::{VideoDescriptor, VideoEntry};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Run defaults from `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Presets evaluated when none are named explicitly.
    pub default_presets: Vec<String>,
    /// Preset every other configuration is compared against.
    pub base_preset: String,
    /// Directory holding the raw videos, relative to the catalog.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Metric whose summary is the quality axis of each curve.
    #[serde(default = "default_quality_metric")]
    pub quality_metric: String,
    /// Attribute of that metric used as quality.
    #[serde(default = "default_quality_attr")]
    pub quality_attr: String,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_quality_metric() -> String {
    "PSNR".to_string()
}

fn default_quality_attr() -> String {
    "Avg".to_string()
}

/// A loaded and validated catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    /// Run defaults.
    pub config: RunConfig,
    /// Video manifest.
    pub videos: BTreeMap<String, VideoEntry>,
    /// Metric registry.
    pub metrics: BTreeMap<String, MetricSpec>,
    /// Preset registry.
    pub presets: BTreeMap<String, Preset>,
}

impl Catalog {
    /// File names inside a catalog directory.
    pub const CONFIG_FILE: &'static str = "config.json";
    /// Video manifest file name.
    pub const VIDEOS_FILE: &'static str = "videos.json";
    /// Metric registry file name.
    pub const METRICS_FILE: &'static str = "metrics.json";
    /// Preset registry file name.
    pub const PRESETS_FILE: &'static str = "presets.json";

    /// Load all four files from `dir` and validate cross references.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        let catalog = Self {
            config: read_json(&root.join(Self::CONFIG_FILE))?,
            videos: read_json(&root.join(Self::VIDEOS_FILE))?,
            metrics: read_json(&root.join(Self::METRICS_FILE))?,
            presets: read_json(&root.join(Self::PRESETS_FILE))?,
            root,
        };
        catalog.validate()?;
        log::debug!(
            "loaded catalog {}: {} videos, {} metrics, {} presets",
            catalog.root.display(),
            catalog.videos.len(),
            catalog.metrics.len(),
            catalog.presets.len()
        );
        Ok(catalog)
    }

    /// Build a catalog from parts already in memory.
    pub fn from_parts(
        root: impl Into<PathBuf>,
        config: RunConfig,
        videos: BTreeMap<String, VideoEntry>,
        metrics: BTreeMap<String, MetricSpec>,
        presets: BTreeMap<String, Preset>,
    ) -> Result<Self> {
        let catalog = Self {
            root: root.into(),
            config,
            videos,
            metrics,
            presets,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        if self.videos.is_empty() {
            return Err(Error::Catalog("no videos".to_string()));
        }
        for name in self
            .config
            .default_presets
            .iter()
            .chain(std::iter::once(&self.config.base_preset))
        {
            self.preset(name)?;
        }
        let quality = self.metrics.get(&self.config.quality_metric).ok_or_else(|| {
            Error::Catalog(format!("unknown quality metric '{}'", self.config.quality_metric))
        })?;
        if quality.kind == MetricKind::PerFrame
            && !quality.attr.iter().any(|a| *a == self.config.quality_attr)
        {
            return Err(Error::Catalog(format!(
                "metric '{}' does not report '{}'",
                self.config.quality_metric, self.config.quality_attr
            )));
        }
        for (name, preset) in &self.presets {
            preset
                .base_values()
                .map_err(|e| Error::Catalog(format!("preset '{name}': {e}")))?;
            if let Some(flagged) = preset.flags.keys().find(|k| !preset.parameters.contains_key(*k)) {
                return Err(Error::Catalog(format!(
                    "preset '{name}' has a flag for unknown parameter '{flagged}'"
                )));
            }
        }
        Ok(())
    }

    /// Catalog directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Asset directory resolved against the catalog.
    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(&self.config.assets_dir)
    }

    /// Look up a preset by name.
    pub fn preset(&self, name: &str) -> Result<&Preset> {
        self.presets
            .get(name)
            .ok_or_else(|| Error::Catalog(format!("unknown preset '{name}'")))
    }

    /// Look up a video by file name.
    pub fn video(&self, name: &str) -> Result<VideoDescriptor> {
        self.videos
            .get(name)
            .map(|entry| VideoDescriptor::from_entry(name, entry, &self.assets_dir()))
            .ok_or_else(|| Error::Catalog(format!("unknown video '{name}'")))
    }

    /// All videos in manifest order.
    #[must_use]
    pub fn video_list(&self) -> Vec<VideoDescriptor> {
        let assets = self.assets_dir();
        self.videos
            .iter()
            .map(|(name, entry)| VideoDescriptor::from_entry(name, entry, &assets))
            .collect()
    }

    /// Encoder command of a preset, resolved against the catalog.
    pub fn encoder_command(&self, preset: &str) -> Result<CommandRecipe> {
        Ok(self.preset(preset)?.command.resolved(&self.root))
    }

    /// All metric tools, resolved against the catalog.
    #[must_use]
    pub fn resolved_metrics(&self) -> BTreeMap<String, MetricSpec> {
        self.metrics
            .iter()
            .map(|(name, spec)| {
                let mut spec = spec.clone();
                spec.command = spec.command.resolved(&self.root);
                (name.clone(), spec)
            })
            .collect()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::CatalogFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| Error::CatalogFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
