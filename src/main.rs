use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vidriff::audio::{AudioPrompt, RiffusionClient};
use vidriff::config::Config;
use vidriff::pipeline::{self, RunOptions, ScoreOptions};
use vidriff::spectrogram::{
    audio_duration_for_width, calculate_required_width, DEFAULT_HOP_LENGTH, DEFAULT_SAMPLE_RATE,
    DEFAULT_TAIL_MARGIN, SpectrogramParams,
};
use vidriff::video::FfmpegEditor;

#[derive(Parser)]
#[command(name = "vidriff")]
#[command(version, about = "Split a video and score its parts with AI-generated audio")]
#[command(long_about = "Split a video into equal parts, generate audio from a text prompt with a \
    spectrogram diffusion model, attach it to a part, and bundle everything into a zip archive.\n\n\
    Run without a command to start the interactive wizard.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Step through upload, split, generate and download interactively
    Interactive,

    /// Print the spectrogram width needed for a clip duration
    Width {
        /// Clip duration in seconds
        #[arg(short, long)]
        duration: f64,

        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,

        #[arg(long, default_value_t = DEFAULT_HOP_LENGTH)]
        hop_length: u32,

        /// Extra columns requested on top of the required width
        #[arg(long, default_value_t = DEFAULT_TAIL_MARGIN)]
        margin: u32,
    },

    /// Split a video, optionally add generated audio to one part, and archive
    Run {
        /// Input video file
        input: PathBuf,

        /// Number of parts to split the video into
        #[arg(short = 'n', long)]
        parts: usize,

        /// Part (1-based) to add generated audio to
        #[arg(short, long, requires = "prompt")]
        part: Option<usize>,

        /// Prompt for audio generation
        #[arg(long, requires = "part")]
        prompt: Option<String>,

        /// Negative prompt for audio generation
        #[arg(long, requires = "prompt")]
        negative_prompt: Option<String>,

        /// Seed for generation
        #[arg(long, requires = "prompt")]
        seed: Option<u64>,

        /// Number of inference steps
        #[arg(long, requires = "prompt")]
        steps: Option<u32>,

        /// Classifier-free guidance scale
        #[arg(long, requires = "prompt")]
        guidance: Option<f32>,

        /// Directory for split parts (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn install_ctrlc_handler() {
    // dialoguer hides the cursor while a prompt is active.
    let result = ctrlc::set_handler(|| {
        let _ = console::Term::stderr().show_cursor();
        eprintln!("\nInterrupted");
        std::process::exit(130);
    });
    if let Err(e) = result {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }
}

fn print_width(duration: f64, sample_rate: u32, hop_length: u32, margin: u32) -> Result<()> {
    let params = SpectrogramParams {
        sample_rate,
        hop_length,
        tail_margin: margin,
        ..SpectrogramParams::default()
    };
    params.validate()?;

    let width = calculate_required_width(duration, sample_rate, hop_length)?;
    let padded = width
        .checked_add(params.tail_margin)
        .with_context(|| format!("Padded width {width} + {margin} does not fit in u32"))?;
    println!("Required width: {width}");
    println!(
        "  covers {:.3}s",
        audio_duration_for_width(width, sample_rate, hop_length).as_secs_f64()
    );
    println!("Padded width:   {padded} (+{margin})");
    println!(
        "  covers {:.3}s",
        audio_duration_for_width(padded, sample_rate, hop_length).as_secs_f64()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Interactive => {
            install_ctrlc_handler();
            let config = Config::load().context("Failed to load configuration")?;
            vidriff::interactive::run_interactive_wizard(config).await
        }
        Command::Width {
            duration,
            sample_rate,
            hop_length,
            margin,
        } => print_width(duration, sample_rate, hop_length, margin),
        Command::Run {
            input,
            parts,
            part,
            prompt,
            negative_prompt,
            seed,
            steps,
            guidance,
            output_dir,
        } => {
            if !input.exists() {
                anyhow::bail!("Input file not found: {}", input.display());
            }

            let mut config = Config::load().context("Failed to load configuration")?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            config
                .validate()
                .context("Configuration validation failed")?;

            let score = match (part, prompt) {
                (Some(part), Some(prompt)) => {
                    let mut audio_prompt = AudioPrompt::with_defaults(prompt, &config.generation);
                    if let Some(negative) = negative_prompt {
                        audio_prompt = audio_prompt.with_negative_prompt(negative);
                    }
                    if let Some(seed) = seed {
                        audio_prompt = audio_prompt.with_seed(seed);
                    }
                    if let Some(steps) = steps {
                        audio_prompt = audio_prompt.with_steps(steps);
                    }
                    if let Some(guidance) = guidance {
                        audio_prompt = audio_prompt.with_guidance(guidance);
                    }
                    Some(ScoreOptions {
                        part,
                        prompt: audio_prompt,
                    })
                }
                _ => None,
            };

            info!("Input:     {}", input.display());
            info!("Parts:     {}", parts);
            info!("Output:    {}", config.output_dir.display());
            if let Some(ref score) = score {
                info!("Score:     part {} with \"{}\"", score.part, score.prompt.prompt);
                info!("Generator: {}", config.generator_url);
            }

            let editor = FfmpegEditor::new()?;
            let generator = RiffusionClient::from_config(&config)?;

            let result = pipeline::run(
                &config,
                &editor,
                &generator,
                RunOptions {
                    input,
                    parts,
                    score,
                    show_progress: true,
                },
            )
            .await?;

            pipeline::print_summary(&result);
            Ok(())
        }
    }
}
