use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, VidriffError};

use super::VideoEditor;

/// What an attach produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachOutcome {
    pub output: PathBuf,
    pub video_duration: Duration,
    pub audio_duration: Duration,
    /// Set when the audio was cut to the video's length.
    pub trimmed_to: Option<Duration>,
}

/// Put `audio` on `video`, writing a new file at `output`.
///
/// Audio longer than the video is cut to the video's exact length. The video
/// itself is never shortened or stretched, and `video` is left untouched.
/// `known_audio_duration` skips probing the audio when the caller already
/// knows it. A failed mux leaves no output file behind.
pub async fn attach_audio(
    editor: &dyn VideoEditor,
    video: &Path,
    audio: &Path,
    output: &Path,
    known_audio_duration: Option<Duration>,
) -> Result<AttachOutcome> {
    if !video.exists() {
        return Err(VidriffError::FileNotFound(video.display().to_string()));
    }
    if !audio.exists() {
        return Err(VidriffError::FileNotFound(audio.display().to_string()));
    }
    if output == video {
        return Err(VidriffError::InvalidInput(
            "attach output must differ from the source part".to_string(),
        ));
    }

    let video_duration = editor.probe_duration(video).await?;
    let audio_duration = match known_audio_duration {
        Some(d) => d,
        None => editor.probe_duration(audio).await?,
    };

    let trimmed_to = (audio_duration > video_duration).then_some(video_duration);
    match trimmed_to {
        Some(limit) => debug!(
            "Trimming {:.2}s of audio to {:.2}s",
            audio_duration.as_secs_f64(),
            limit.as_secs_f64()
        ),
        None => debug!(
            "Audio ({:.2}s) fits video ({:.2}s)",
            audio_duration.as_secs_f64(),
            video_duration.as_secs_f64()
        ),
    }

    if let Err(e) = editor.mux_audio(video, audio, output, trimmed_to).await {
        if output.exists() {
            if let Err(cleanup) = fs::remove_file(output) {
                warn!("Failed to remove {}: {}", output.display(), cleanup);
            }
        }
        return Err(e);
    }

    if !output.exists() {
        return Err(VidriffError::VideoProcessing(
            "Output file was not created".to_string(),
        ));
    }

    info!("Audio added to {}", output.display());

    Ok(AttachOutcome {
        output: output.to_path_buf(),
        video_duration,
        audio_duration,
        trimmed_to,
    })
}
