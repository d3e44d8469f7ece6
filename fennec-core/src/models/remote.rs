//! HTTP adapters for the inference sidecar. One endpoint family per
//! model kind; the sidecar loads weights on its first `/load`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{FennecError, Result};

use super::{DetectedFace, FaceDetector, SentenceEncoder, SpeechToText, VisualEncoder, l2_normalize};

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vector: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    faces: Vec<DetectedFaceDto>,
}

#[derive(Debug, Deserialize)]
struct DetectedFaceDto {
    bbox: [i32; 4],
    vector: Vec<f32>,
}

/// Shared lazy-load plumbing. `load()` is serialized by a mutex so two
/// pipeline stages cannot race the sidecar's weight load; `ready()` only
/// reads the flag.
#[derive(Debug)]
struct RemoteHost {
    client: Client,
    base_url: String,
    slug: &'static str,
    loaded: AtomicBool,
    load_lock: Mutex<()>,
}

impl RemoteHost {
    fn new(client: Client, base_url: &str, slug: &'static str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            slug,
            loaded: AtomicBool::new(false),
            load_lock: Mutex::new(()),
        }
    }

    fn url(&self, op: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.slug, op)
    }

    fn ready(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    async fn load(&self) -> Result<()> {
        if self.ready() {
            return Ok(());
        }
        let _guard = self.load_lock.lock().await;
        if self.ready() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.url("load"))
            .send()
            .await
            .map_err(|e| FennecError::ModelNotReady(format!("{}: {e}", self.slug)))?;
        if !response.status().is_success() {
            return Err(FennecError::ModelNotReady(format!(
                "{}: load returned {}",
                self.slug,
                response.status()
            )));
        }

        self.loaded.store(true, Ordering::Release);
        info!(model = self.slug, "model host loaded");
        Ok(())
    }

    async fn ensure_loaded(&self) -> Result<()> {
        self.load().await
    }

    async fn post_json_for_vector(&self, op: &str, body: serde_json::Value) -> Result<Vec<f32>> {
        let response: EmbedResponse = self
            .client
            .post(self.url(op))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let mut vector = response.vector;
        l2_normalize(&mut vector);
        Ok(vector)
    }

    async fn post_bytes_for_vector(&self, op: &str, bytes: &[u8]) -> Result<Vec<f32>> {
        let response: EmbedResponse = self
            .client
            .post(self.url(op))
            .body(bytes.to_vec())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let mut vector = response.vector;
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

#[derive(Debug)]
pub struct RemoteVisualEncoder {
    host: RemoteHost,
}

impl RemoteVisualEncoder {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            host: RemoteHost::new(client, base_url, "visual"),
        }
    }
}

#[async_trait]
impl VisualEncoder for RemoteVisualEncoder {
    async fn ready(&self) -> bool {
        self.host.ready()
    }

    async fn load(&self) -> Result<()> {
        self.host.load().await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.host.ensure_loaded().await?;
        self.host
            .post_json_for_vector("embed_text", serde_json::json!({ "text": text }))
            .await
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        self.host.ensure_loaded().await?;
        self.host.post_bytes_for_vector("embed_image", image).await
    }
}

#[derive(Debug)]
pub struct RemoteSpeechToText {
    host: RemoteHost,
}

impl RemoteSpeechToText {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            host: RemoteHost::new(client, base_url, "speech"),
        }
    }
}

#[async_trait]
impl SpeechToText for RemoteSpeechToText {
    async fn ready(&self) -> bool {
        self.host.ready()
    }

    async fn load(&self) -> Result<()> {
        self.host.load().await
    }

    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        self.host.ensure_loaded().await?;
        let response: TranscribeResponse = self
            .host
            .client
            .post(self.host.url("transcribe"))
            .body(wav.to_vec())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.text)
    }
}

#[derive(Debug)]
pub struct RemoteSentenceEncoder {
    host: RemoteHost,
}

impl RemoteSentenceEncoder {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            host: RemoteHost::new(client, base_url, "sentence"),
        }
    }
}

#[async_trait]
impl SentenceEncoder for RemoteSentenceEncoder {
    async fn ready(&self) -> bool {
        self.host.ready()
    }

    async fn load(&self) -> Result<()> {
        self.host.load().await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.host.ensure_loaded().await?;
        self.host
            .post_json_for_vector("embed", serde_json::json!({ "text": text }))
            .await
    }
}

#[derive(Debug)]
pub struct RemoteFaceDetector {
    host: RemoteHost,
}

impl RemoteFaceDetector {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            host: RemoteHost::new(client, base_url, "face"),
        }
    }
}

#[async_trait]
impl FaceDetector for RemoteFaceDetector {
    async fn ready(&self) -> bool {
        self.host.ready()
    }

    async fn load(&self) -> Result<()> {
        self.host.load().await
    }

    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>> {
        self.host.ensure_loaded().await?;
        let response: DetectResponse = self
            .host
            .client
            .post(self.host.url("detect"))
            .body(image.to_vec())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .faces
            .into_iter()
            .map(|dto| {
                let mut embedding = dto.vector;
                l2_normalize(&mut embedding);
                DetectedFace {
                    bbox: (dto.bbox[0], dto.bbox[1], dto.bbox[2], dto.bbox[3]),
                    embedding,
                }
            })
            .collect())
    }
}
