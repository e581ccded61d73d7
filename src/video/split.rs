use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, VidriffError};

use super::{PartSpan, VideoEditor, VideoPart};

/// Plan `n_parts` equal, contiguous spans covering `total_duration`.
///
/// Part `i` covers `[i/n * D, (i+1)/n * D)`; the last part ends exactly at `D`.
pub fn plan_parts(total_duration: Duration, n_parts: usize) -> Result<Vec<PartSpan>> {
    if n_parts == 0 {
        return Err(VidriffError::InvalidInput(
            "number of parts must be a positive integer".to_string(),
        ));
    }
    if total_duration.is_zero() {
        return Err(VidriffError::VideoProcessing(
            "source video has zero duration".to_string(),
        ));
    }

    let total = total_duration.as_secs_f64();
    let part = total / n_parts as f64;

    let spans = (0..n_parts)
        .map(|i| {
            let start = Duration::from_secs_f64(i as f64 * part);
            let end = if i + 1 == n_parts {
                total_duration
            } else {
                Duration::from_secs_f64((i + 1) as f64 * part)
            };
            PartSpan { start, end }
        })
        .collect();

    Ok(spans)
}

/// Split `source` into `n_parts` files in `output_dir`.
///
/// Parts are rendered into a staging directory and only moved into
/// `output_dir` once every one of them succeeded. On failure nothing is left
/// behind.
pub async fn split_video(
    editor: &dyn VideoEditor,
    source: &Path,
    n_parts: usize,
    output_dir: &Path,
) -> Result<Vec<VideoPart>> {
    if n_parts == 0 {
        return Err(VidriffError::InvalidInput(
            "number of parts must be a positive integer".to_string(),
        ));
    }
    if !source.exists() {
        return Err(VidriffError::FileNotFound(source.display().to_string()));
    }

    let total_duration = editor.probe_duration(source).await?;
    let spans = plan_parts(total_duration, n_parts)?;

    fs::create_dir_all(output_dir).map_err(|e| {
        VidriffError::VideoProcessing(format!("Failed to create output directory: {e}"))
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".split-")
        .tempdir_in(output_dir)?;

    info!(
        "Splitting {} ({:.2}s) into {} parts with {}",
        source.display(),
        total_duration.as_secs_f64(),
        n_parts,
        editor.name()
    );

    let mut staged = Vec::with_capacity(n_parts);
    for (index, span) in spans.iter().enumerate() {
        let part = VideoPart::new(index + 1, staging.path());
        debug!(
            "Writing part {}: {:.3}s to {:.3}s -> {}",
            part.number,
            span.start.as_secs_f64(),
            span.end.as_secs_f64(),
            part.path.display()
        );
        editor
            .extract_clip(source, span.start, span.end, &part.path)
            .await?;
        if !part.path.exists() {
            return Err(VidriffError::VideoProcessing(format!(
                "Part {} was not created",
                part.number
            )));
        }
        staged.push(part);
    }

    let mut parts: Vec<VideoPart> = Vec::with_capacity(staged.len());
    for part in staged {
        let destination = output_dir.join(part.file_name());
        if let Err(e) = fs::rename(&part.path, &destination) {
            for moved in &parts {
                if let Err(cleanup) = fs::remove_file(&moved.path) {
                    warn!("Failed to remove {}: {}", moved.path.display(), cleanup);
                }
            }
            return Err(VidriffError::Io(e));
        }
        parts.push(VideoPart {
            path: destination,
            ..part
        });
    }

    info!("Video has been split into {} parts", parts.len());
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_three_parts_of_thirty_seconds() {
        let spans = plan_parts(Duration::from_secs(30), 3).unwrap();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].start, Duration::ZERO);
        assert_eq!(spans[0].end, Duration::from_secs(10));
        assert_eq!(spans[1].start, Duration::from_secs(10));
        assert_eq!(spans[1].end, Duration::from_secs(20));
        assert_eq!(spans[2].start, Duration::from_secs(20));
        assert_eq!(spans[2].end, Duration::from_secs(30));
    }

    #[test]
    fn test_plan_has_no_gaps() {
        let total = Duration::from_millis(12_345);
        let spans = plan_parts(total, 7).unwrap();
        assert_eq!(spans.first().unwrap().start, Duration::ZERO);
        assert_eq!(spans.last().unwrap().end, total);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_plan_single_part() {
        let spans = plan_parts(Duration::from_secs(8), 1).unwrap();
        assert_eq!(
            spans,
            vec![PartSpan {
                start: Duration::ZERO,
                end: Duration::from_secs(8)
            }]
        );
    }

    #[test]
    fn test_plan_rejects_zero_parts() {
        assert!(matches!(
            plan_parts(Duration::from_secs(8), 0),
            Err(VidriffError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_plan_rejects_empty_video() {
        assert!(plan_parts(Duration::ZERO, 2).is_err());
    }
}
