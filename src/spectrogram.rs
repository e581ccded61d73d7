//! Spectrogram geometry for the audio diffusion model.
//!
//! The model renders audio as a spectrogram image whose width maps to
//! playback length: `duration = width * hop_length / sample_rate`. Widths
//! must be multiples of 8 to fit the model's latent grid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VidriffError};

/// Sample rate the model's spectrograms are rendered at.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Samples between successive spectrogram columns.
pub const DEFAULT_HOP_LENGTH: u32 = 512;

/// Spectrogram image height expected by the model.
pub const DEFAULT_HEIGHT: u32 = 512;

/// Extra columns requested beyond the required width.
///
/// On slow execution paths the last 1-1.5 seconds of generated audio can be
/// missing or inaccurate. Requesting 320 extra columns gives a tail that the
/// attach step trims away.
pub const DEFAULT_TAIL_MARGIN: u32 = 320;

/// Image widths must be multiples of this.
pub const WIDTH_ALIGNMENT: u32 = 8;

/// Compute the minimum spectrogram width, aligned to 8, whose audio lasts at
/// least `duration` seconds.
///
/// Non-positive and non-finite durations are rejected, as are zero sample
/// rates and hop lengths.
pub fn calculate_required_width(duration: f64, sample_rate: u32, hop_length: u32) -> Result<u32> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(VidriffError::InvalidDuration(duration));
    }
    if sample_rate == 0 {
        return Err(VidriffError::InvalidInput(
            "sample rate must be positive".to_string(),
        ));
    }
    if hop_length == 0 {
        return Err(VidriffError::InvalidInput(
            "hop length must be positive".to_string(),
        ));
    }

    let frames = (duration * sample_rate as f64 / hop_length as f64).floor();
    if frames >= u32::MAX as f64 {
        return Err(VidriffError::InvalidDuration(duration));
    }

    // Flooring can land one column short when the quotient has a fraction.
    let mut frames = frames as u32;
    if (frames as f64 * hop_length as f64 / sample_rate as f64) < duration {
        frames += 1;
    }
    let remainder = frames % WIDTH_ALIGNMENT;
    if remainder != 0 {
        frames = frames
            .checked_add(WIDTH_ALIGNMENT - remainder)
            .ok_or(VidriffError::InvalidDuration(duration))?;
    }

    Ok(frames)
}

/// Playback length of audio rendered from a spectrogram of `width` columns.
pub fn audio_duration_for_width(width: u32, sample_rate: u32, hop_length: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(width as f64 * hop_length as f64 / sample_rate as f64)
}

/// Spectrogram settings shared by the width calculation and generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramParams {
    pub sample_rate: u32,
    pub hop_length: u32,
    pub height: u32,
    /// Columns added on top of the required width.
    pub tail_margin: u32,
}

impl Default for SpectrogramParams {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            hop_length: DEFAULT_HOP_LENGTH,
            height: DEFAULT_HEIGHT,
            tail_margin: DEFAULT_TAIL_MARGIN,
        }
    }
}

impl SpectrogramParams {
    /// Required width for `duration`, without the tail margin.
    pub fn required_width(&self, duration: Duration) -> Result<u32> {
        calculate_required_width(duration.as_secs_f64(), self.sample_rate, self.hop_length)
    }

    /// Width to request from the model for a clip of `duration`.
    pub fn padded_width(&self, duration: Duration) -> Result<u32> {
        let width = self.required_width(duration)?;
        width
            .checked_add(self.tail_margin)
            .ok_or(VidriffError::InvalidDuration(duration.as_secs_f64()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(VidriffError::Config(
                "spectrogram.sample_rate must be greater than 0".to_string(),
            ));
        }
        if self.hop_length == 0 || self.hop_length % WIDTH_ALIGNMENT != 0 {
            return Err(VidriffError::Config(format!(
                "spectrogram.hop_length must be a positive multiple of {WIDTH_ALIGNMENT}, got {}",
                self.hop_length
            )));
        }
        if self.height == 0 || self.height % WIDTH_ALIGNMENT != 0 {
            return Err(VidriffError::Config(format!(
                "spectrogram.height must be a positive multiple of {WIDTH_ALIGNMENT}, got {}",
                self.height
            )));
        }
        if self.tail_margin % WIDTH_ALIGNMENT != 0 {
            return Err(VidriffError::Config(format!(
                "spectrogram.tail_margin must be a multiple of {WIDTH_ALIGNMENT}, got {}",
                self.tail_margin
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn width(duration: f64) -> u32 {
        calculate_required_width(duration, DEFAULT_SAMPLE_RATE, DEFAULT_HOP_LENGTH).unwrap()
    }

    #[test]
    fn test_known_widths() {
        // 2.5 * 44100 / 512 = 215.33
        assert_eq!(width(2.5), 216);
        // 1.0 * 44100 / 512 = 86.13
        assert_eq!(width(1.0), 88);
        assert_eq!(width(10.0), 864);
    }

    #[test]
    fn test_width_is_aligned_and_long_enough() {
        let mut duration = 0.05;
        while duration < 120.0 {
            let w = width(duration);
            assert_eq!(w % 8, 0, "width {w} for {duration}s not aligned");
            let produced = w as f64 * DEFAULT_HOP_LENGTH as f64 / DEFAULT_SAMPLE_RATE as f64;
            assert!(
                produced >= duration,
                "width {w} yields {produced}s, shorter than {duration}s"
            );
            duration += 0.37;
        }
    }

    #[test]
    fn test_exact_column_boundary_still_covers_duration() {
        // 88.5 columns: flooring to 88 would already be aligned and fall short.
        let duration = 88.5 * 512.0 / 44_100.0;
        assert_eq!(width(duration), 96);
    }

    #[test]
    fn test_exact_aligned_boundary_is_not_widened() {
        // 104 columns cover this duration exactly.
        let duration = 104.0 * 512.0 / 44_100.0;
        assert_eq!(width(duration), 104);
    }

    #[test]
    fn test_aligned_boundaries_return_minimum() {
        for columns in (8..20_000u32).step_by(8) {
            let duration = columns as f64 * 512.0 / 44_100.0;
            assert_eq!(width(duration), columns, "{columns} columns");
        }
    }

    #[test]
    fn test_width_is_monotonic() {
        let mut previous = 0;
        for step in 1..2000 {
            let w = width(step as f64 * 0.01);
            assert!(w >= previous);
            previous = w;
        }
    }

    #[test]
    fn test_other_model_constants() {
        // 3s at 22050 Hz with hop 256 = 258.4 columns
        assert_eq!(calculate_required_width(3.0, 22_050, 256).unwrap(), 264);
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        assert!(matches!(
            calculate_required_width(0.0, DEFAULT_SAMPLE_RATE, DEFAULT_HOP_LENGTH),
            Err(VidriffError::InvalidDuration(_))
        ));
        assert!(matches!(
            calculate_required_width(-1.5, DEFAULT_SAMPLE_RATE, DEFAULT_HOP_LENGTH),
            Err(VidriffError::InvalidDuration(_))
        ));
        assert!(calculate_required_width(f64::NAN, DEFAULT_SAMPLE_RATE, DEFAULT_HOP_LENGTH).is_err());
        assert!(
            calculate_required_width(f64::INFINITY, DEFAULT_SAMPLE_RATE, DEFAULT_HOP_LENGTH)
                .is_err()
        );
    }

    #[test]
    fn test_rejects_zero_constants() {
        assert!(calculate_required_width(1.0, 0, DEFAULT_HOP_LENGTH).is_err());
        assert!(calculate_required_width(1.0, DEFAULT_SAMPLE_RATE, 0).is_err());
    }

    #[test]
    fn test_padded_width_adds_margin() {
        let params = SpectrogramParams::default();
        let duration = Duration::from_secs(10);
        assert_eq!(params.padded_width(duration).unwrap(), 864 + 320);

        let params = SpectrogramParams {
            tail_margin: 0,
            ..SpectrogramParams::default()
        };
        assert_eq!(params.padded_width(duration).unwrap(), 864);
    }

    #[test]
    fn test_audio_duration_for_width() {
        let d = audio_duration_for_width(88, DEFAULT_SAMPLE_RATE, DEFAULT_HOP_LENGTH);
        assert!((d.as_secs_f64() - 1.0217).abs() < 1e-3);
        assert_eq!(audio_duration_for_width(88, 0, 512), Duration::ZERO);
    }

    #[test]
    fn test_validate_params() {
        assert!(SpectrogramParams::default().validate().is_ok());

        let bad_hop = SpectrogramParams {
            hop_length: 500,
            ..SpectrogramParams::default()
        };
        assert!(bad_hop.validate().is_err());

        let bad_margin = SpectrogramParams {
            tail_margin: 321,
            ..SpectrogramParams::default()
        };
        assert!(bad_margin.validate().is_err());

        let zero_rate = SpectrogramParams {
            sample_rate: 0,
            ..SpectrogramParams::default()
        };
        assert!(zero_rate.validate().is_err());
    }
}
