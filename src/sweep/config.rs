//! Expansion of presets into tagged configurations.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::acquire::{EncoderRecipe, run_git};
use crate::catalog::{Catalog, ParamValue};
use crate::error::{Error, Result};

/// Revision of the encoder under development.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Short commit id.
    pub id: String,
    /// Commit subject line.
    pub message: String,
}

impl Revision {
    /// Placeholder used when no revision is known.
    pub const UNKNOWN: &'static str = "unknown";

    /// Read the revision from git in `dir`, falling back to `unknown`.
    #[must_use]
    pub fn detect(dir: &Path) -> Self {
        Self {
            id: run_git(dir, &["rev-parse", "--short", "HEAD"])
                .unwrap_or_else(|| Self::UNKNOWN.to_string()),
            message: run_git(dir, &["log", "-1", "--pretty=%s"]).unwrap_or_default(),
        }
    }

    /// A revision given explicitly.
    #[must_use]
    pub fn fixed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: String::new(),
        }
    }
}

/// One point of a preset's parameter cross product.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Preset the configuration came from.
    pub preset: String,
    /// Unique label, `preset[#revision][@k=v,...]`.
    pub tag: String,
    /// Chosen value per swept parameter.
    pub params: BTreeMap<String, ParamValue>,
    /// Quantization levels to sample.
    pub qps: Vec<i32>,
    /// Encoder invocation for this configuration.
    pub encoder: EncoderRecipe,
}

impl Configuration {
    /// Configuration of `preset` with explicit parameter values.
    pub fn new(
        catalog: &Catalog,
        preset: &str,
        params: BTreeMap<String, ParamValue>,
        revision: &Revision,
    ) -> Result<Self> {
        let spec = catalog.preset(preset)?;
        let tag = make_tag(preset, spec.candidate.then_some(revision.id.as_str()), &params);
        let encoder = EncoderRecipe::from_preset(catalog, preset, &params, Some(tag.clone()))?;
        Ok(Self {
            preset: preset.to_string(),
            tag,
            params,
            qps: spec.base_values()?,
            encoder,
        })
    }

    /// Shift every QP by `offset`.
    #[must_use]
    pub fn with_qp_offset(mut self, offset: i32) -> Self {
        for qp in &mut self.qps {
            *qp += offset;
        }
        self
    }
}

/// Configuration tag: `preset`, `#revision` for the candidate encoder, then
/// `@k=v,...` when there are parameters.
#[must_use]
pub fn make_tag(preset: &str, revision: Option<&str>, params: &BTreeMap<String, ParamValue>) -> String {
    let mut tag = preset.to_string();
    if let Some(rev) = revision {
        tag.push('#');
        tag.push_str(rev);
    }
    if !params.is_empty() {
        let desc: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        tag.push('@');
        tag.push_str(&desc.join(","));
    }
    tag
}

/// Cross product of a preset's non-base parameters.
///
/// Parameters vary in name order, the last one fastest. A preset without
/// swept parameters yields exactly one configuration.
pub fn expand(catalog: &Catalog, preset: &str, revision: &Revision) -> Result<Vec<Configuration>> {
    let spec = catalog.preset(preset)?;
    let mut combos: Vec<BTreeMap<String, ParamValue>> = vec![BTreeMap::new()];
    for (name, values) in spec.swept_parameters() {
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |value| {
                    let mut next = combo.clone();
                    next.insert(name.clone(), value.clone());
                    next
                })
            })
            .collect();
    }

    let configs = combos
        .into_iter()
        .map(|params| Configuration::new(catalog, preset, params, revision))
        .collect::<Result<Vec<_>>>()?;

    let mut seen = std::collections::BTreeSet::new();
    if let Some(dup) = configs.iter().find(|c| !seen.insert(c.tag.as_str())) {
        return Err(Error::Catalog(format!("duplicate configuration tag '{}'", dup.tag)));
    }
    Ok(configs)
}
