pub mod archive;
pub mod audio;
pub mod config;
pub mod error;
pub mod interactive;
pub mod pipeline;
pub mod session;
pub mod spectrogram;
pub mod video;

pub use config::Config;
pub use error::{Result, VidriffError};
pub use pipeline::{print_summary, run, RunOptions, RunResult, RunStats, ScoreOptions};
pub use session::{ScoredPart, Session, SessionState};
pub use spectrogram::{calculate_required_width, SpectrogramParams};
