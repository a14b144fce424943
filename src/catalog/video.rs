//! Test video manifest entries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One entry of `videos.json`, keyed by file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    /// Number of frames to encode.
    pub frames: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: f64,
}

/// A test video with its location resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    /// File name as listed in the manifest.
    pub name: String,
    /// Path of the raw source.
    pub path: PathBuf,
    /// Number of frames to encode.
    pub frames: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: f64,
}

impl VideoDescriptor {
    /// Resolve a manifest entry against the assets directory.
    #[must_use]
    pub fn from_entry(name: &str, entry: &VideoEntry, assets_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            path: assets_dir.join(name),
            frames: entry.frames,
            width: entry.width,
            height: entry.height,
            frame_rate: entry.frame_rate,
        }
    }

    /// Frame rate formatted without a trailing `.0` for integral rates.
    #[must_use]
    pub fn frame_rate_arg(&self) -> String {
        if self.frame_rate.fract() == 0.0 {
            format!("{}", self.frame_rate as i64)
        } else {
            format!("{}", self.frame_rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_entry() {
        let entry: VideoEntry =
            serde_json::from_str(r#"{"frames": 10, "width": 416, "height": 240, "frame_rate": 50}"#)
                .unwrap();
        let video = VideoDescriptor::from_entry("BQSquare_416x240_60.yuv", &entry, Path::new("assets"));
        assert_eq!(video.path, PathBuf::from("assets/BQSquare_416x240_60.yuv"));
        assert_eq!(video.frame_rate_arg(), "50");
    }

    #[test]
    fn test_fractional_frame_rate() {
        let video = VideoDescriptor {
            name: "a.y4m".to_string(),
            path: PathBuf::from("a.y4m"),
            frames: 1,
            width: 2,
            height: 2,
            frame_rate: 29.97,
        };
        assert_eq!(video.frame_rate_arg(), "29.97");
    }
}
