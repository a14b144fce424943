//! Sample acquisition: encode one video at one QP, then score the result.
//!
//! Each acquisition runs the encoder recipe, reads the compressed byte count
//! from its standard output, then runs every registered metric tool on the
//! original and compressed files. Compressed files land in a [`ScratchDir`]
//! whose name embeds the process id and a run identifier.
//!
//! ```no_run
//! use rd_eval::acquire::{Acquirer, EncoderRecipe, ScratchDir};
//! use rd_eval::catalog::Catalog;
//!
//! let catalog = Catalog::load("tools/evaluation")?;
//! let scratch = ScratchDir::create(None, "example", false)?;
//! let acquirer = Acquirer::from_catalog(&catalog, scratch);
//! let encoder = EncoderRecipe::from_preset(&catalog, "x265", &Default::default(), None)?;
//! let video = catalog.video("BQSquare_416x240_60.yuv")?;
//! let record = acquirer.acquire(&video, 32, &encoder)?;
//! println!("{} bytes at {:.2} dB", record.bytes, acquirer.sample(&record)?.quality());
//! # Ok::<(), rd_eval::Error>(())
//! ```

mod metric;
mod process;

pub use metric::{MetricReport, parse_byte_count, parse_metric};
pub use process::{EncodeParams, ProcessOutput, run_git, run_process};

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CommandRecipe, MetricSpec, ParamValue, VideoDescriptor};
use crate::curve::Sample;
use crate::error::{Error, Result};

/// An encoder invocation for one configuration.
#[derive(Debug, Clone)]
pub struct EncoderRecipe {
    /// Configuration tag, embedded in output file names.
    pub tag: String,
    /// Codec tag handed to metric tools.
    pub target: String,
    /// Encoder command.
    pub command: CommandRecipe,
    /// Configuration parameters, already rendered with their flags.
    pub params: BTreeMap<String, String>,
    /// Output file extension.
    pub extension: String,
}

impl EncoderRecipe {
    /// Recipe for one configuration of a catalog preset.
    ///
    /// `config` holds the chosen value of each swept parameter. `tag`
    /// defaults to the preset name.
    pub fn from_preset(
        catalog: &Catalog,
        preset_name: &str,
        config: &BTreeMap<String, ParamValue>,
        tag: Option<String>,
    ) -> Result<Self> {
        let preset = catalog.preset(preset_name)?;
        let params = config
            .iter()
            .map(|(name, value)| (name.clone(), preset.render_param(name, value)))
            .collect();
        Ok(Self {
            tag: tag.unwrap_or_else(|| preset_name.to_string()),
            target: preset.target.clone(),
            command: catalog.encoder_command(preset_name)?,
            params,
            extension: preset.output_extension().to_string(),
        })
    }

    fn encode_params(&self, video: &VideoDescriptor, qp: i32, output: &Path) -> EncodeParams {
        let mut params = EncodeParams::new()
            .with("input", video.path.display())
            .with("frames", video.frames)
            .with("width", video.width)
            .with("height", video.height)
            .with("frame_rate", video.frame_rate_arg())
            .with("qp", qp)
            .with("output", output.display());
        for (name, value) in &self.params {
            params.insert(name.clone(), value);
        }
        params
    }
}

/// Persisted result of one acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// `{video name}[{tag}]_{qp}`.
    pub title: String,
    /// Quantization parameter.
    pub qp: i32,
    /// Compressed size reported by the encoder.
    pub bytes: u64,
    /// Encode wall-clock time in milliseconds.
    pub duration_ms: u64,
    /// Metric name to scores.
    pub metrics: BTreeMap<String, MetricReport>,
}

impl SampleRecord {
    /// Reduced score of `metric`/`attr`.
    pub fn score(&self, metric: &str, attr: &str) -> Result<f64> {
        self.metrics
            .get(metric)
            .and_then(|m| m.summary.get(attr))
            .copied()
            .ok_or_else(|| Error::MetricOutput {
                metric: metric.to_string(),
                reason: format!("no '{attr}' score for {}", self.title),
            })
    }
}

/// Per-run scratch directory for compressed outputs.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<tempfile::TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Create `videos_{pid}_{run_id}_XXXX` under `parent` (or the system
    /// temp dir). With `keep`, the directory survives the run.
    pub fn create(parent: Option<&Path>, run_id: &str, keep: bool) -> Result<Self> {
        let prefix = format!("videos_{}_{}_", std::process::id(), run_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        let dir = if keep {
            log::info!("keeping encoder outputs in {}", path.display());
            let _ = dir.keep();
            None
        } else {
            Some(dir)
        };
        Ok(Self { dir, path })
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory is removed on drop.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.dir.is_some()
    }
}

/// Runs encoder and metric tools for individual samples.
#[derive(Debug)]
pub struct Acquirer {
    scratch: ScratchDir,
    metrics: BTreeMap<String, MetricSpec>,
    quality_metric: String,
    quality_attr: String,
    timeout: Option<Duration>,
}

impl Acquirer {
    /// Acquirer with an explicit metric registry.
    #[must_use]
    pub fn new(
        scratch: ScratchDir,
        metrics: BTreeMap<String, MetricSpec>,
        quality_metric: impl Into<String>,
        quality_attr: impl Into<String>,
    ) -> Self {
        Self {
            scratch,
            metrics,
            quality_metric: quality_metric.into(),
            quality_attr: quality_attr.into(),
            timeout: None,
        }
    }

    /// Acquirer using the catalog's metrics and quality axis.
    #[must_use]
    pub fn from_catalog(catalog: &Catalog, scratch: ScratchDir) -> Self {
        Self::new(
            scratch,
            catalog.resolved_metrics(),
            catalog.config.quality_metric.clone(),
            catalog.config.quality_attr.clone(),
        )
    }

    /// Kill tools that run longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scratch directory in use.
    #[must_use]
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Encode `video` at `qp` and score the result with every metric.
    pub fn acquire(
        &self,
        video: &VideoDescriptor,
        qp: i32,
        encoder: &EncoderRecipe,
    ) -> Result<SampleRecord> {
        let title = sample_title(&video.name, &encoder.tag, qp);
        let output = self
            .scratch
            .path()
            .join(format!("{title}.{}", encoder.extension));

        let params = encoder.encode_params(video, qp, &output);
        let encoded = run_process(&encoder.command, &params, self.timeout)?;
        let bytes = parse_byte_count(&encoder.command.name(), &encoded.stdout)?;

        let mut metrics = BTreeMap::new();
        for (name, spec) in &self.metrics {
            let params = EncodeParams::new()
                .with("original", video.path.display())
                .with("compressed", output.display())
                .with("target", &encoder.target);
            let scored = run_process(&spec.command, &params, self.timeout)?;
            let report = parse_metric(name, spec.kind, &spec.attr, video.frames, &scored.stdout)?;
            metrics.insert(name.clone(), report);
        }

        let record = SampleRecord {
            title,
            qp,
            bytes,
            duration_ms: encoded.elapsed.as_millis() as u64,
            metrics,
        };
        log::debug!("{}: {} bytes", record.title, record.bytes);
        Ok(record)
    }

    /// The (size, quality) sample of a record on the configured quality axis.
    pub fn sample(&self, record: &SampleRecord) -> Result<Sample> {
        let quality = record.score(&self.quality_metric, &self.quality_attr)?;
        Sample::new(record.bytes, quality)
    }
}

/// Longest name or tag embedded verbatim in a file name.
const MAX_TITLE_TAG: usize = 64;

/// Title of one sample, also the stem of its compressed file:
/// `{video name}[{tag}]_{qp}`.
///
/// The full manifest name is kept (extension included) so `a.yuv` and
/// `a.y4m` never share an output file.
#[must_use]
pub fn sample_title(video_name: &str, tag: &str, qp: i32) -> String {
    format!("{}[{}]_{qp}", sanitize(video_name), sanitize(tag))
}

/// File-name-safe form of a tag. Long tags (search trials carry their whole
/// parameter vector) are cut and suffixed with a hash of the full tag.
pub(crate) fn sanitize(tag: &str) -> String {
    let safe: String = tag
        .chars()
        .map(|c| if c == '/' || c.is_whitespace() { '_' } else { c })
        .collect();
    if safe.len() <= MAX_TITLE_TAG {
        return safe;
    }
    let mut hasher = DefaultHasher::new();
    tag.hash(&mut hasher);
    let cut = (0..=MAX_TITLE_TAG)
        .rev()
        .find(|&i| safe.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}~{:016x}", &safe[..cut], hasher.finish())
}
