use crate::error::{Result, VidriffError};
use crate::spectrogram::SpectrogramParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default address of the text-to-spectrogram inference service.
pub const DEFAULT_GENERATOR_URL: &str = "http://127.0.0.1:3013";

/// Lowest step count that still produces usable spectrograms.
pub const MIN_INFERENCE_STEPS: u32 = 10;

/// Device hint forwarded to the inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Let the service use an accelerator when present and fall back to CPU.
    #[default]
    Auto,
    Cuda,
    Cpu,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cuda => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

impl std::str::FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cuda" | "gpu" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            _ => Err(format!("Unknown device: {}. Use 'auto', 'cuda' or 'cpu'", s)),
        }
    }
}

/// Defaults offered for each generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub seed: u64,
    pub num_inference_steps: u32,
    pub guidance: f32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            seed: 42,
            num_inference_steps: 30,
            guidance: 7.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generator_url: String,
    pub api_key: Option<String>,
    pub device: Device,
    pub request_timeout_secs: u64,
    /// Where uploaded videos and generated audio are kept.
    pub work_dir: PathBuf,
    /// Where split parts and audio-attached variants are written.
    pub output_dir: PathBuf,
    /// Where archives are written.
    pub archive_dir: PathBuf,
    pub spectrogram: SpectrogramParams,
    pub generation: GenerationDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generator_url: DEFAULT_GENERATOR_URL.to_string(),
            api_key: None,
            device: Device::default(),
            request_timeout_secs: 600,
            work_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("output"),
            archive_dir: PathBuf::from("."),
            spectrogram: SpectrogramParams::default(),
            generation: GenerationDefaults::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = Self::from_toml(&contents)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str::<Config>(contents)
            .map_err(|e| VidriffError::Config(format!("Failed to parse config file: {e}")))
    }

    /// Override fields from `VIDRIFF_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("VIDRIFF_GENERATOR_URL") {
            self.generator_url = url;
        }
        if let Ok(key) = std::env::var("VIDRIFF_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(device) = std::env::var("VIDRIFF_DEVICE") {
            if let Ok(d) = device.parse() {
                self.device = d;
            }
        }
        if let Ok(dir) = std::env::var("VIDRIFF_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("VIDRIFF_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(margin) = std::env::var("VIDRIFF_TAIL_MARGIN") {
            if let Ok(m) = margin.parse() {
                self.spectrogram.tail_margin = m;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.spectrogram.validate()?;

        if self.generator_url.trim().is_empty() {
            return Err(VidriffError::Config(
                "generator_url must not be empty. Point it at a running inference service"
                    .to_string(),
            ));
        }

        if self.generation.num_inference_steps < MIN_INFERENCE_STEPS {
            return Err(VidriffError::Config(format!(
                "generation.num_inference_steps must be at least {MIN_INFERENCE_STEPS}"
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(VidriffError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_file_path().ok_or_else(|| {
            VidriffError::Config("Could not determine config directory".to_string())
        })?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VidriffError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&config_path, contents)?;
        Ok(config_path)
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vidriff").join("config.toml"))
    }
}
