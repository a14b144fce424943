//! Parsing of encoder and metric tool output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::MetricKind;
use crate::curve::clamp_quality;
use crate::error::{Error, Result};

/// Scores one metric tool produced for one compressed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    /// Reduced value per attribute.
    pub summary: BTreeMap<String, f64>,
    /// Records exactly as the tool printed them.
    pub per_frame: Vec<Value>,
}

/// Parse the byte count an encoder prints on its last non-empty stdout line.
pub fn parse_byte_count(program: &str, stdout: &str) -> Result<u64> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or("");
    line.parse().map_err(|_| Error::ByteCount {
        program: program.to_string(),
        output: stdout.trim().to_string(),
    })
}

/// Parse metric tool output and reduce the requested attributes.
///
/// Per-frame metrics are summed over records and divided by `frames` (the
/// frame count of the video, not the number of records). `+infinity` after
/// reduction is clamped to the quality ceiling.
pub fn parse_metric(
    metric: &str,
    kind: MetricKind,
    attrs: &[String],
    frames: u32,
    stdout: &str,
) -> Result<MetricReport> {
    let fail = |reason: String| Error::MetricOutput {
        metric: metric.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(&quote_non_finite(stdout))
        .map_err(|e| fail(format!("invalid JSON: {e}")))?;
    let records = match value {
        Value::Array(records) => records,
        record @ Value::Object(_) => vec![record],
        other => return Err(fail(format!("expected an array of records, got {other}"))),
    };
    if records.is_empty() {
        return Err(fail("no records".to_string()));
    }

    let summary = match kind {
        MetricKind::PerFrame => {
            if frames == 0 {
                return Err(fail("video has zero frames".to_string()));
            }
            let mut summary = BTreeMap::new();
            for attr in attrs {
                let mut total = 0.0;
                for (i, record) in records.iter().enumerate() {
                    total += attribute(record, attr)
                        .ok_or_else(|| fail(format!("record {i} has no numeric '{attr}'")))?;
                }
                summary.insert(attr.clone(), clamp_quality(total / f64::from(frames)));
            }
            summary
        }
        MetricKind::Single => attrs
            .iter()
            .map(|attr| {
                attribute(&records[0], attr)
                    .map(|v| (attr.clone(), clamp_quality(v)))
                    .ok_or_else(|| fail(format!("no numeric '{attr}'")))
            })
            .collect::<Result<_>>()?,
    };

    Ok(MetricReport {
        summary,
        per_frame: records,
    })
}

fn attribute(record: &Value, attr: &str) -> Option<f64> {
    match record.get(attr)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Quote bare `Infinity`, `-Infinity` and `NaN` tokens so the text parses as
/// JSON. Tokens inside strings are left alone.
fn quote_non_finite(text: &str) -> String {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = TOKENS.iter().find(|t| rest.starts_with(**t)) {
            out.push('"');
            out.push_str(token);
            out.push('"');
            i += token.len();
            continue;
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}
