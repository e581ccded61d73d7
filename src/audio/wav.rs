use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use hound::WavReader;

use crate::error::{Result, VidriffError};

fn duration_of<R: std::io::Read>(reader: &WavReader<R>) -> Result<Duration> {
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(VidriffError::Generation(
            "WAV header reports a zero sample rate".to_string(),
        ));
    }
    // `duration()` counts samples per channel.
    Ok(Duration::from_secs_f64(
        reader.duration() as f64 / spec.sample_rate as f64,
    ))
}

/// Playback length of a WAV file.
pub fn wav_duration(path: &Path) -> Result<Duration> {
    if !path.exists() {
        return Err(VidriffError::FileNotFound(path.display().to_string()));
    }
    let reader = WavReader::open(path)?;
    duration_of(&reader)
}

/// Playback length of an in-memory WAV file. Fails if the bytes are not WAV.
pub fn wav_duration_from_bytes(bytes: &[u8]) -> Result<Duration> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    duration_of(&reader)
}
