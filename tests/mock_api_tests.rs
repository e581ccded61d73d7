//! Mock API tests for the inference service client
//!
//! These tests run the client against a local wiremock server, so no GPU
//! service is needed.

use base64::Engine;
use hound::{SampleFormat, WavSpec, WavWriter};
use serde_json::json;
use std::io::Cursor;
use std::time::Duration;
use vidriff::audio::{AudioGenerator, AudioPrompt, GenerationRequest, RiffusionClient};
use vidriff::config::Device;
use vidriff::VidriffError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn wav_base64(seconds: u32, sample_rate: u32) -> String {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..seconds * sample_rate {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    base64::engine::general_purpose::STANDARD.encode(cursor.into_inner())
}

fn png_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n\x1a\nfake")
}

fn request(prompt: &str) -> GenerationRequest {
    AudioPrompt::new(prompt)
        .with_seed(7)
        .into_request(1184, 512, Device::Cuda)
}

fn client(server: &MockServer) -> RiffusionClient {
    RiffusionClient::new(server.uri()).with_retry_delay(Duration::from_millis(10))
}

// ============================================================================
// Success Tests
// ============================================================================

mod success_tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_audio_and_spectrogram() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .and(body_partial_json(json!({
                "prompt": "rain on a tin roof",
                "width": 1184,
                "height": 512,
                "seed": 7,
                "num_inference_steps": 30,
                "device": "cuda"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": png_base64(),
                "audio": wav_base64(2, 8_000),
                "duration_s": 2.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = client(&server)
            .generate(&request("rain on a tin roof"), dir.path())
            .await
            .unwrap();

        assert!(audio.audio_path.exists());
        assert!(audio.audio_path.starts_with(dir.path()));
        assert_eq!(audio.duration, Some(Duration::from_secs(2)));
        let spectrogram = audio.spectrogram_path.unwrap();
        assert!(std::fs::read(&spectrogram).unwrap().starts_with(b"\x89PNG"));
        assert_eq!(
            vidriff::audio::wav_duration(&audio.audio_path).unwrap(),
            Duration::from_secs(2)
        );
    }

    #[tokio::test]
    async fn test_negative_prompt_is_omitted_when_blank() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": png_base64(),
                "audio": wav_base64(1, 8_000)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = AudioPrompt::new("jazz")
            .with_negative_prompt("   ")
            .into_request(512, 512, Device::Auto);
        client(&server).generate(&request, dir.path()).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body.get("negative_prompt").is_none());
        assert_eq!(body["device"], "auto");
    }

    #[tokio::test]
    async fn test_data_url_payloads_are_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": format!("data:image/png;base64,{}", png_base64()),
                "audio": format!("data:audio/wav;base64,{}", wav_base64(1, 8_000))
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = client(&server)
            .generate(&request("birdsong"), dir.path())
            .await
            .unwrap();
        assert_eq!(audio.duration, Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_api_key_is_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .and(header("Authorization", "Bearer secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": png_base64(),
                "audio": wav_base64(1, 8_000)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server)
            .with_api_key("secret-key")
            .generate(&request("drums"), dir.path())
            .await;
        assert!(result.is_ok());
    }
}

// ============================================================================
// Failure Tests
// ============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "width too large"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server)
            .generate(&request("rain"), dir.path())
            .await;

        match result {
            Err(VidriffError::Api(message)) => assert!(message.contains("width too large")),
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server)
            .generate(&request("rain"), dir.path())
            .await;

        assert!(matches!(result, Err(VidriffError::Api(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": png_base64(),
                "audio": wav_base64(1, 8_000)
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = client(&server)
            .generate(&request("rain"), dir.path())
            .await
            .unwrap();
        assert!(audio.audio_path.exists());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_audio_is_a_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txt2audio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": png_base64(),
                "audio": base64::engine::general_purpose::STANDARD.encode(b"not a wav")
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server)
            .generate(&request("rain"), dir.path())
            .await;
        assert!(matches!(result, Err(VidriffError::Generation(_))));
    }

    #[tokio::test]
    async fn test_empty_prompt_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server)
            .generate(&request(" "), dir.path())
            .await;
        assert!(matches!(result, Err(VidriffError::EmptyPrompt)));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let client = RiffusionClient::new("http://127.0.0.1:1");
        let dir = tempfile::tempdir().unwrap();
        let result = client
            .with_retry_delay(Duration::from_millis(1))
            .generate(&request("rain"), dir.path())
            .await;
        assert!(result.is_err());
    }
}
