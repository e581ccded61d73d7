use crate::audio::{AudioGenerator, AudioPrompt, RiffusionClient};
use crate::config::{Config, MIN_INFERENCE_STEPS};
use crate::error::VidriffError;
use crate::pipeline::spinner;
use crate::session::{Session, SessionState};
use crate::video::{is_supported_video, FfmpegEditor, VideoEditor, VideoPart};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::fs;
use std::path::{Path, PathBuf};

/// What the user can do once a video is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Generate,
    Resplit,
    Download,
    Quit,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::Generate => "Generate and add audio",
            Action::Resplit => "Split the video again",
            Action::Download => "Download archive",
            Action::Quit => "Quit",
        }
    }
}

fn available_actions(state: SessionState) -> Vec<Action> {
    let mut actions = vec![Action::Generate, Action::Resplit];
    if state == SessionState::Archived {
        actions.push(Action::Download);
    }
    actions.push(Action::Quit);
    actions
}

pub async fn run_interactive_wizard(config: Config) -> anyhow::Result<()> {
    print_header();

    let config = setup_generator(config)?;
    config.validate()?;

    let editor = FfmpegEditor::new()?;
    let generator = RiffusionClient::from_config(&config)?;
    let mut session = Session::new();

    loop {
        // Step 1: Upload
        let input = select_source_file()?;
        session.upload(&input, &config.work_dir)?;

        // Step 2: Split
        split_step(&mut session, &editor, &config).await?;

        // Step 3: Generate/attach until the user downloads or quits
        let downloaded = loop {
            let actions = available_actions(session.state());
            let labels: Vec<&str> = actions.iter().map(|a| a.label()).collect();
            let selection = Select::new()
                .with_prompt("What next?")
                .items(&labels)
                .default(0)
                .interact()?;

            match actions[selection] {
                Action::Generate => {
                    generate_step(&mut session, &editor, &generator, &config).await?
                }
                Action::Resplit => split_step(&mut session, &editor, &config).await?,
                Action::Download => {
                    if download_step(&mut session)? {
                        break true;
                    }
                }
                Action::Quit => break false,
            }
        };

        if !downloaded {
            break;
        }

        if !Confirm::new()
            .with_prompt("Start over with another video?")
            .default(false)
            .interact()?
        {
            break;
        }
        println!();
    }

    println!("\n{} Bye!", style("✓").green());
    Ok(())
}

fn print_header() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║          vidriff - Video Audio Manipulator        ║").cyan()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════════════════╝").cyan()
    );
    println!();
    println!("  🎞️  Split your video into multiple parts");
    println!("  🎵 Generate audio from a text prompt");
    println!("  🔗 Attach the audio to the part you choose");
    println!("  🗃️  Download an archive with every part\n");
}

fn setup_generator(mut config: Config) -> anyhow::Result<Config> {
    println!(
        "{} Inference service: {}",
        style("•").cyan(),
        style(&config.generator_url).bold()
    );

    if Confirm::new()
        .with_prompt("Use this inference service?")
        .default(true)
        .interact()?
    {
        return Ok(config);
    }

    let url: String = Input::new()
        .with_prompt("Inference service URL")
        .interact_text()?;
    if url.trim().is_empty() {
        anyhow::bail!("Inference service URL is required");
    }
    config.generator_url = url.trim().to_string();

    let api_key: String = Input::new()
        .with_prompt("API key (leave empty for none)")
        .allow_empty(true)
        .interact_text()?;
    config.api_key = (!api_key.trim().is_empty()).then(|| api_key.trim().to_string());

    if Confirm::new()
        .with_prompt("Save these settings to the config file?")
        .default(true)
        .interact()?
    {
        let path = config.save()?;
        println!(
            "{} Settings saved to {}\n",
            style("✓").green(),
            path.display()
        );
    }

    Ok(config)
}

fn select_source_file() -> anyhow::Result<PathBuf> {
    println!("\n{}", style("Upload a video file:").bold());

    let files = scan_video_files(".")?;

    if files.is_empty() {
        println!("  No video files found in current directory.\n");
        return prompt_for_path();
    }

    let mut items: Vec<String> = files
        .iter()
        .map(|f| {
            let size = fs::metadata(f)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "?".to_string());
            format!("{} ({})", f.display(), size)
        })
        .collect();
    items.push("Enter custom path...".to_string());

    let selection = Select::new()
        .with_prompt("Choose a video")
        .items(&items)
        .default(0)
        .interact()?;

    if selection == files.len() {
        prompt_for_path()
    } else {
        Ok(files[selection].clone())
    }
}

fn prompt_for_path() -> anyhow::Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt("Enter file path")
        .interact_text()?;
    let path = PathBuf::from(path.trim());
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    if !is_supported_video(&path) {
        println!(
            "{} {} is not an mp4/mov/avi file, FFmpeg may still read it",
            style("!").yellow(),
            path.display()
        );
    }
    Ok(path)
}

fn scan_video_files(dir: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && is_supported_video(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

async fn split_step(
    session: &mut Session,
    editor: &dyn VideoEditor,
    config: &Config,
) -> anyhow::Result<()> {
    loop {
        let n_parts: usize = Input::new()
            .with_prompt("Number of parts to split the video into")
            .default(3)
            .validate_with(|n: &usize| {
                if *n >= 1 {
                    Ok(())
                } else {
                    Err("Enter at least 1")
                }
            })
            .interact_text()?;

        let pb = spinner("Splitting video, please wait...✨");
        match session.split(editor, n_parts, &config.output_dir).await {
            Ok(parts) => {
                pb.finish_with_message(format!(
                    "✓ Video has been split into {} parts",
                    parts.len()
                ));
                print_parts(parts);
                return Ok(());
            }
            Err(e) => {
                pb.finish_and_clear();
                println!("{} Split failed: {}", style("✗").red(), e);
                if !Confirm::new()
                    .with_prompt("Try again?")
                    .default(true)
                    .interact()?
                {
                    return Err(e.into());
                }
            }
        }
    }
}

fn part_label(index: usize, part: &VideoPart) -> String {
    let name = part
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if part.with_audio {
        format!("{:>3}. {} ♪", index + 1, name)
    } else {
        format!("{:>3}. {}", index + 1, name)
    }
}

fn print_parts(parts: &[VideoPart]) {
    for (index, part) in parts.iter().enumerate() {
        println!("  {}", part_label(index, part));
    }
    println!();
}

async fn generate_step(
    session: &mut Session,
    editor: &dyn VideoEditor,
    generator: &dyn AudioGenerator,
    config: &Config,
) -> anyhow::Result<()> {
    let labels: Vec<String> = session
        .parts()
        .iter()
        .enumerate()
        .map(|(i, p)| part_label(i, p))
        .collect();
    let selection = Select::new()
        .with_prompt(format!(
            "Select the part (1-{}) to add the generated audio",
            labels.len()
        ))
        .items(&labels)
        .default(session.selected_part().saturating_sub(1))
        .interact()?;
    session.select_part(selection + 1)?;

    let prompt: String = Input::new()
        .with_prompt("Prompt for audio generation")
        .allow_empty(true)
        .interact_text()?;
    if prompt.trim().is_empty() {
        println!(
            "{} Prompt must be provided to generate audio.",
            style("!").yellow()
        );
        return Ok(());
    }

    let negative_prompt: String = Input::new()
        .with_prompt("Negative prompt (optional)")
        .allow_empty(true)
        .interact_text()?;
    let seed: u64 = Input::new()
        .with_prompt("Seed (change for different variations)")
        .default(config.generation.seed)
        .interact_text()?;
    let steps: u32 = Input::new()
        .with_prompt("Inference steps")
        .default(config.generation.num_inference_steps)
        .validate_with(|s: &u32| {
            if *s >= MIN_INFERENCE_STEPS {
                Ok(())
            } else {
                Err(format!("Use at least {MIN_INFERENCE_STEPS} steps"))
            }
        })
        .interact_text()?;

    let audio_prompt = AudioPrompt::with_defaults(prompt, &config.generation)
        .with_negative_prompt(negative_prompt)
        .with_seed(seed)
        .with_steps(steps);

    let pb = spinner("Generating audio, please wait...🎵");
    let result = session
        .generate_and_attach(
            editor,
            generator,
            audio_prompt,
            &config.spectrogram,
            config.device,
            &config.work_dir,
            &config.archive_dir,
        )
        .await;

    match result {
        Ok(scored) => {
            pb.finish_with_message(format!(
                "✓ Audio added to video part {}",
                scored.part.number
            ));
            if let Some(ref spectrogram) = scored.audio.spectrogram_path {
                println!("  Spectrogram: {}", style(spectrogram.display()).cyan());
            }
            println!("  Saved as:    {}", style(scored.part.path.display()).cyan());
            println!("  Archive:     {}\n", style(scored.archive.display()).cyan());
        }
        Err(VidriffError::EmptyPrompt) => {
            pb.finish_and_clear();
            println!(
                "{} Prompt must be provided to generate audio.",
                style("!").yellow()
            );
        }
        Err(e) => {
            pb.finish_and_clear();
            println!("{} Generation failed: {}\n", style("✗").red(), e);
        }
    }

    Ok(())
}

/// Copy the archive to a destination. Returns `true` once the session reset.
fn download_step(session: &mut Session) -> anyhow::Result<bool> {
    let Some(archive) = session.archive().map(Path::to_path_buf) else {
        println!("{} No files to download", style("!").yellow());
        return Ok(false);
    };

    let destination: String = Input::new()
        .with_prompt("Save archive to directory")
        .default(".".to_string())
        .interact_text()?;
    let destination = PathBuf::from(destination.trim());
    fs::create_dir_all(&destination)?;

    let file_name = archive
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Archive path has no file name"))?;
    let target = destination.join(file_name);
    let same_file = target.exists() && fs::canonicalize(&target)? == fs::canonicalize(&archive)?;
    if !same_file {
        fs::copy(&archive, &target)?;
    }

    session.complete_download()?;
    println!(
        "{} Archive saved to {}",
        style("✓").green(),
        style(target.display()).cyan()
    );
    Ok(true)
}
