use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, VidriffError};

use super::VideoEditor;

const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            VidriffError::VideoProcessing(format!(
                "FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(VidriffError::VideoProcessing(
            "FFmpeg check failed".to_string(),
        ));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = std::process::Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            VidriffError::VideoProcessing(format!(
                "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(VidriffError::VideoProcessing(
            "FFprobe check failed".to_string(),
        ));
    }

    debug!("FFprobe is available");
    Ok(())
}

fn format_secs(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// [`VideoEditor`] backed by the `ffmpeg` and `ffprobe` binaries.
///
/// Parts are re-encoded with H.264 video and AAC audio so every output plays
/// the same way regardless of the source container.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEditor {
    _private: (),
}

impl FfmpegEditor {
    /// Create an editor after checking both binaries are on `PATH`.
    pub fn new() -> Result<Self> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(Self { _private: () })
    }

    async fn run_ffmpeg(&self, mut command: Command, what: &str) -> Result<()> {
        let output = command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VidriffError::VideoProcessing(format!("Failed to run FFmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(5)..].join("\n");
            return Err(VidriffError::VideoProcessing(format!(
                "FFmpeg {what} failed: {tail}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoEditor for FfmpegEditor {
    async fn probe_duration(&self, path: &Path) -> Result<Duration> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| VidriffError::VideoProcessing(format!("Failed to run FFprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidriffError::VideoProcessing(format!(
                "FFprobe failed on {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        let duration_str = String::from_utf8_lossy(&output.stdout);
        let duration_secs: f64 = duration_str.trim().parse().map_err(|e| {
            VidriffError::VideoProcessing(format!(
                "Failed to parse duration '{}': {e}",
                duration_str.trim()
            ))
        })?;

        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(VidriffError::VideoProcessing(format!(
                "FFprobe reported an invalid duration for {}: {duration_secs}",
                path.display()
            )));
        }

        Ok(Duration::from_secs_f64(duration_secs))
    }

    async fn extract_clip(
        &self,
        source: &Path,
        start: Duration,
        end: Duration,
        output: &Path,
    ) -> Result<()> {
        let length = end.saturating_sub(start);
        if length.is_zero() {
            return Err(VidriffError::VideoProcessing(
                "Clip duration is zero".to_string(),
            ));
        }

        debug!(
            "Extracting clip: start={}, duration={} -> {}",
            format_secs(start),
            format_secs(length),
            output.display()
        );

        let mut command = Command::new("ffmpeg");
        command
            .args(["-y", "-v", "error", "-ss"])
            .arg(format_secs(start))
            .arg("-i")
            .arg(source)
            .arg("-t")
            .arg(format_secs(length))
            .args(["-c:v", VIDEO_CODEC, "-c:a", AUDIO_CODEC])
            .arg(output);

        self.run_ffmpeg(command, "clip extraction").await
    }

    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        audio_limit: Option<Duration>,
    ) -> Result<()> {
        let mut command = Command::new("ffmpeg");
        command.args(["-y", "-v", "error", "-i"]).arg(video);

        // Input option: limits only the audio stream.
        if let Some(limit) = audio_limit {
            command.arg("-t").arg(format_secs(limit));
        }

        command
            .arg("-i")
            .arg(audio)
            .args([
                "-map", "0:v:0", "-map", "1:a:0", "-c:v", VIDEO_CODEC, "-c:a", AUDIO_CODEC,
            ])
            .arg(output);

        debug!(
            "Muxing {} onto {} -> {}",
            audio.display(),
            video.display(),
            output.display()
        );

        self.run_ffmpeg(command, "audio muxing").await
    }

    fn name(&self) -> &'static str {
        "FFmpeg"
    }
}
