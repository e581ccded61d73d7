pub mod riffusion;
pub mod wav;

pub use riffusion::RiffusionClient;
pub use wav::{wav_duration, wav_duration_from_bytes};

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{Device, GenerationDefaults, MIN_INFERENCE_STEPS};
use crate::error::{Result, VidriffError};

/// What the user asks the model for.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPrompt {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub seed: u64,
    pub num_inference_steps: u32,
    pub guidance: f32,
}

impl AudioPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::with_defaults(prompt, &GenerationDefaults::default())
    }

    pub fn with_defaults(prompt: impl Into<String>, defaults: &GenerationDefaults) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            seed: defaults.seed,
            num_inference_steps: defaults.num_inference_steps,
            guidance: defaults.guidance,
        }
    }

    /// Blank negative prompts are dropped.
    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        let negative_prompt = negative_prompt.into();
        self.negative_prompt = if negative_prompt.trim().is_empty() {
            None
        } else {
            Some(negative_prompt)
        };
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_steps(mut self, num_inference_steps: u32) -> Self {
        self.num_inference_steps = num_inference_steps;
        self
    }

    pub fn with_guidance(mut self, guidance: f32) -> Self {
        self.guidance = guidance;
        self
    }

    /// Reject prompts the model must never be called with.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(VidriffError::EmptyPrompt);
        }
        if self.num_inference_steps == 0 {
            return Err(VidriffError::InvalidInput(format!(
                "inference steps must be positive (at least {MIN_INFERENCE_STEPS} recommended)"
            )));
        }
        if !self.guidance.is_finite() {
            return Err(VidriffError::InvalidInput(
                "guidance must be a finite number".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the model request for a spectrogram of `width` x `height`.
    pub fn into_request(self, width: u32, height: u32, device: Device) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            width,
            height,
            seed: self.seed,
            num_inference_steps: self.num_inference_steps,
            guidance: self.guidance,
            device,
        }
    }
}

/// A full text-to-spectrogram request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub num_inference_steps: u32,
    pub guidance: f32,
    pub device: Device,
}

/// Audio produced by a generator. Consumed by the attach step.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudio {
    pub audio_path: PathBuf,
    pub spectrogram_path: Option<PathBuf>,
    pub duration: Option<Duration>,
}

/// Text-to-audio backend.
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    /// Generate audio for `request`, writing files into `output_dir`.
    async fn generate(&self, request: &GenerationRequest, output_dir: &Path)
        -> Result<GeneratedAudio>;

    fn name(&self) -> &'static str;
}
