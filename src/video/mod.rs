pub mod attach;
pub mod ffmpeg;
pub mod split;

pub use attach::{attach_audio, AttachOutcome};
pub use ffmpeg::{check_ffmpeg, check_ffprobe, FfmpegEditor};
pub use split::{plan_parts, split_video};

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;

use crate::error::Result;

/// Extension of every part file written by the tool.
pub const PART_EXTENSION: &str = "mp4";

/// Suffix marking a part that carries generated audio.
pub const WITH_AUDIO_SUFFIX: &str = "_with_audio";

/// Container extensions accepted as source videos.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// A time interval of the source video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartSpan {
    pub start: Duration,
    pub end: Duration,
}

impl PartSpan {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// One output video file: a split part or an audio-attached variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPart {
    /// 1-based part number.
    pub number: usize,
    pub id: Uuid,
    pub path: PathBuf,
    pub with_audio: bool,
}

impl VideoPart {
    /// A fresh split part in `dir`.
    pub fn new(number: usize, dir: &Path) -> Self {
        let id = Uuid::new_v4();
        Self {
            number,
            id,
            path: dir.join(part_file_name(number, id, false)),
            with_audio: false,
        }
    }

    /// A fresh audio-attached variant of part `number` in `dir`.
    pub fn with_audio(number: usize, dir: &Path) -> Self {
        let id = Uuid::new_v4();
        Self {
            number,
            id,
            path: dir.join(part_file_name(number, id, true)),
            with_audio: true,
        }
    }

    /// Recover a part from a path produced by this tool.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let re = Regex::new(
            r"^part_(\d+)_([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})(_with_audio)?\.mp4$",
        )
        .expect("Invalid regex");
        let caps = re.captures(name)?;

        let number: usize = caps.get(1)?.as_str().parse().ok()?;
        if number == 0 {
            return None;
        }
        let id = Uuid::parse_str(caps.get(2)?.as_str()).ok()?;

        Some(Self {
            number,
            id,
            path: path.to_path_buf(),
            with_audio: caps.get(3).is_some(),
        })
    }

    pub fn file_name(&self) -> String {
        part_file_name(self.number, self.id, self.with_audio)
    }
}

/// `part_{number}_{id}.mp4`, or `part_{number}_{id}_with_audio.mp4`.
pub fn part_file_name(number: usize, id: Uuid, with_audio: bool) -> String {
    let suffix = if with_audio { WITH_AUDIO_SUFFIX } else { "" };
    format!("part_{number}_{id}{suffix}.{PART_EXTENSION}")
}

/// Whether `path` has a source video extension.
pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// The video engine the tool drives. Splitting and muxing are built on these
/// three primitives.
#[async_trait]
pub trait VideoEditor: Send + Sync {
    /// Duration of a video or audio file.
    async fn probe_duration(&self, path: &Path) -> Result<Duration>;

    /// Write `[start, end)` of `source` to `output`.
    async fn extract_clip(
        &self,
        source: &Path,
        start: Duration,
        end: Duration,
        output: &Path,
    ) -> Result<()>;

    /// Write `video` with its audio track replaced by `audio`. When
    /// `audio_limit` is set, only that much of the audio is used.
    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        audio_limit: Option<Duration>,
    ) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_file_names() {
        let id = Uuid::parse_str("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap();
        assert_eq!(
            part_file_name(3, id, false),
            "part_3_0f8fad5b-d9cb-469f-a165-70867728950e.mp4"
        );
        assert_eq!(
            part_file_name(3, id, true),
            "part_3_0f8fad5b-d9cb-469f-a165-70867728950e_with_audio.mp4"
        );
    }

    #[test]
    fn test_new_parts_get_unique_ids() {
        let dir = Path::new("output");
        let a = VideoPart::new(1, dir);
        let b = VideoPart::new(1, dir);
        assert_ne!(a.id, b.id);
        assert_ne!(a.path, b.path);
        assert!(a.path.starts_with("output"));
    }

    #[test]
    fn test_part_from_path() {
        let part = VideoPart::with_audio(7, Path::new("/tmp/out"));
        let parsed = VideoPart::from_path(&part.path).unwrap();
        assert_eq!(parsed, part);
        assert_eq!(parsed.file_name(), part.file_name());

        let silent = VideoPart::new(2, Path::new("/tmp/out"));
        assert!(!VideoPart::from_path(&silent.path).unwrap().with_audio);
    }

    #[test]
    fn test_part_from_foreign_path() {
        assert!(VideoPart::from_path(Path::new("holiday.mp4")).is_none());
        assert!(VideoPart::from_path(Path::new("part_1_not-a-uuid.mp4")).is_none());
        assert!(VideoPart::from_path(Path::new(
            "part_0_0f8fad5b-d9cb-469f-a165-70867728950e.mp4"
        ))
        .is_none());
    }

    #[test]
    fn test_supported_video() {
        assert!(is_supported_video(Path::new("clip.mp4")));
        assert!(is_supported_video(Path::new("clip.MOV")));
        assert!(is_supported_video(Path::new("clip.avi")));
        assert!(!is_supported_video(Path::new("clip.mkv")));
        assert!(!is_supported_video(Path::new("clip")));
    }

    #[test]
    fn test_span_duration() {
        let span = PartSpan {
            start: Duration::from_secs(10),
            end: Duration::from_secs(20),
        };
        assert_eq!(span.duration(), Duration::from_secs(10));
    }
}
