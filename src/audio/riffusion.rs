//! Client for a text-to-spectrogram inference service.
//!
//! The service runs the diffusion pipeline, converts the spectrogram image to
//! a waveform, and returns both as base64 in one JSON response.

use crate::audio::{wav_duration_from_bytes, AudioGenerator, GeneratedAudio, GenerationRequest};
use crate::config::Config;
use crate::error::{Result, VidriffError};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Path of the generation endpoint, relative to the service URL.
const GENERATE_PATH: &str = "/txt2audio";

/// Maximum attempts per request.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    /// Base64 PNG spectrogram.
    image: String,
    /// Base64 WAV audio.
    audio: String,
    #[serde(default)]
    duration_s: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

struct CallError {
    error: VidriffError,
    retryable: bool,
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            error: VidriffError::Http(e),
            retryable: true,
        }
    }
}

/// Decode a base64 payload, accepting an optional `data:<mime>;base64,` prefix.
fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let data = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    Ok(base64::engine::general_purpose::STANDARD.decode(data.trim())?)
}

/// HTTP [`AudioGenerator`].
pub struct RiffusionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry_delay: Duration,
}

impl RiffusionClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            retry_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }

    /// Create a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.generator_url.clone(),
            api_key: config.api_key.clone(),
            retry_delay: Duration::from_millis(BASE_DELAY_MS),
        })
    }

    /// Send a bearer token with each request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base delay between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), GENERATE_PATH)
    }

    async fn call_api(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<InferenceResponse, CallError> {
        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!("Inference service response status: {}", status);

        if status.is_success() {
            let body = response.text().await?;
            let parsed: InferenceResponse =
                serde_json::from_str(&body).map_err(|e| CallError {
                    error: VidriffError::Json(e),
                    retryable: false,
                })?;
            return Ok(parsed);
        }

        let error_body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
            Ok(api_error) => api_error.error,
            Err(_) => error_body,
        };

        Err(CallError {
            error: VidriffError::Api(format!("Inference service error ({status}): {message}")),
            retryable: !status.is_client_error(),
        })
    }

    async fn call_with_retry(&self, request: &GenerationRequest) -> Result<InferenceResponse> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_delay * 2u32.pow(attempt - 1);
                debug!("Retry attempt {} after {:?}", attempt, delay);
                tokio::time::sleep(delay).await;
            }

            match self.call_api(request).await {
                Ok(response) => return Ok(response),
                Err(CallError { error, retryable }) => {
                    if !retryable {
                        return Err(error);
                    }
                    warn!("Attempt {} failed: {}", attempt + 1, error);
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| VidriffError::Api("Unknown error".to_string())))
    }
}

#[async_trait]
impl AudioGenerator for RiffusionClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
    ) -> Result<GeneratedAudio> {
        if request.prompt.trim().is_empty() {
            return Err(VidriffError::EmptyPrompt);
        }

        info!(
            "Generating {}x{} spectrogram ({} steps, seed {}, device {})",
            request.width, request.height, request.num_inference_steps, request.seed, request.device
        );

        let response = self.call_with_retry(request).await?;

        let audio_bytes = decode_payload(&response.audio)?;
        let duration = wav_duration_from_bytes(&audio_bytes).map_err(|e| {
            VidriffError::Generation(format!("Service returned unreadable audio: {e}"))
        })?;
        if let Some(reported) = response.duration_s {
            debug!(
                "Service reported {:.2}s, WAV holds {:.2}s",
                reported,
                duration.as_secs_f64()
            );
        }
        let image_bytes = decode_payload(&response.image)?;

        fs::create_dir_all(output_dir).await?;
        let id = Uuid::new_v4();
        let audio_path = output_dir.join(format!("audio_{id}.wav"));
        let spectrogram_path = output_dir.join(format!("spectrogram_{id}.png"));
        fs::write(&audio_path, &audio_bytes).await?;
        fs::write(&spectrogram_path, &image_bytes).await?;

        info!(
            "Generated {:.2}s of audio at {}",
            duration.as_secs_f64(),
            audio_path.display()
        );

        Ok(GeneratedAudio {
            audio_path,
            spectrogram_path: Some(spectrogram_path),
            duration: Some(duration),
        })
    }

    fn name(&self) -> &'static str {
        "Riffusion"
    }
}
