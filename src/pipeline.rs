use crate::audio::{AudioGenerator, AudioPrompt};
use crate::config::Config;
use crate::error::{Result, VidriffError};
use crate::session::{ScoredPart, Session};
use crate::video::VideoPart;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use crate::video::VideoEditor;

/// Which part gets audio, and from what prompt.
#[derive(Debug, Clone)]
pub struct ScoreOptions {
    /// 1-based part number.
    pub part: usize,
    pub prompt: AudioPrompt,
}

/// A non-interactive run: split, optionally score one part, archive.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub parts: usize,
    pub score: Option<ScoreOptions>,
    /// Show spinners.
    pub show_progress: bool,
}

/// Timings of a run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub total_time: Duration,
    pub split_time: Duration,
    pub generation_time: Option<Duration>,
}

#[derive(Debug)]
pub struct RunResult {
    pub parts: Vec<VideoPart>,
    pub scored: Option<ScoredPart>,
    pub archive: PathBuf,
    pub stats: RunStats,
}

/// Spinner in the style used across the tool.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Drive one [`Session`] from upload to archive without prompting.
pub async fn run(
    config: &Config,
    editor: &dyn VideoEditor,
    generator: &dyn AudioGenerator,
    options: RunOptions,
) -> Result<RunResult> {
    let start_time = Instant::now();

    // Reject a bad prompt before any video work is done.
    if let Some(ref score) = options.score {
        score.prompt.validate()?;
        if score.part == 0 || score.part > options.parts {
            return Err(VidriffError::InvalidInput(format!(
                "part must be between 1 and {}, got {}",
                options.parts, score.part
            )));
        }
    }

    let mut session = Session::new();
    session.upload(&options.input, &config.work_dir)?;

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Split
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 1/2: Splitting into {} parts", options.parts);
    let split_start = Instant::now();
    let pb = options
        .show_progress
        .then(|| spinner("Splitting video, please wait..."));

    let parts = session
        .split(editor, options.parts, &config.output_dir)
        .await?
        .to_vec();

    if let Some(pb) = pb {
        pb.finish_with_message(format!("✓ Video has been split into {} parts", parts.len()));
    }
    let split_time = split_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Generate and attach
    // ═══════════════════════════════════════════════════════════════════════
    let mut generation_time = None;
    let scored = match options.score {
        Some(score) => {
            info!("Stage 2/2: Generating audio for part {}", score.part);
            let generation_start = Instant::now();
            session.select_part(score.part)?;

            let pb = options
                .show_progress
                .then(|| spinner("Generating audio, please wait..."));
            let scored = session
                .generate_and_attach(
                    editor,
                    generator,
                    score.prompt,
                    &config.spectrogram,
                    config.device,
                    &config.work_dir,
                    &config.archive_dir,
                )
                .await?;
            if let Some(pb) = pb {
                pb.finish_with_message(format!(
                    "✓ Audio added to video part {}",
                    scored.part.number
                ));
            }
            generation_time = Some(generation_start.elapsed());
            Some(scored)
        }
        None => {
            info!("Stage 2/2: No prompt given, archiving split parts");
            None
        }
    };

    let archive = match scored {
        Some(ref s) => s.archive.clone(),
        None => session.create_archive(&config.archive_dir)?,
    };

    Ok(RunResult {
        parts: session.parts().to_vec(),
        scored,
        archive,
        stats: RunStats {
            total_time: start_time.elapsed(),
            split_time,
            generation_time,
        },
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print a summary of a run.
pub fn print_summary(result: &RunResult) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                         Run Complete                          ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Archive:    {}", result.archive.display());
    println!("  Files:      {}", result.parts.len());
    for part in &result.parts {
        let marker = if part.with_audio { " ♪" } else { "" };
        println!("    - {}{}", display_name(&part.path), marker);
    }
    if let Some(ref scored) = result.scored {
        println!();
        println!("  Width:      {} columns", scored.width);
        if let Some(limit) = scored.attach.trimmed_to {
            println!(
                "  Audio:      {:.2}s trimmed to {:.2}s",
                scored.attach.audio_duration.as_secs_f64(),
                limit.as_secs_f64()
            );
        } else {
            println!(
                "  Audio:      {:.2}s",
                scored.attach.audio_duration.as_secs_f64()
            );
        }
    }
    println!();
    println!("  Timing:");
    println!("    Split:       {:.2}s", result.stats.split_time.as_secs_f64());
    if let Some(t) = result.stats.generation_time {
        println!("    Generate:    {:.2}s", t.as_secs_f64());
    }
    println!("    Total:       {:.2}s", result.stats.total_time.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(
            display_name(Path::new("/out/part_1_x.mp4")),
            "part_1_x.mp4"
        );
        assert_eq!(display_name(Path::new("/")), "/");
    }
}
