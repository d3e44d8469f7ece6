//! Model hosts: thin adapters over the inference sidecar. Inference
//! internals stay behind HTTP; the adapters own lazy loading, readiness,
//! and output normalization.

pub mod remote;

pub use remote::{
    RemoteFaceDetector, RemoteSentenceEncoder, RemoteSpeechToText, RemoteVisualEncoder,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// A face region reported by the detector, bbox in source-image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bbox: (i32, i32, i32, i32),
    pub embedding: Vec<f32>,
}

/// Text-or-image encoder used for visual search. Both directions embed
/// into the same space, L2-normalized so cosine reduces to dot product.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisualEncoder: Send + Sync {
    async fn ready(&self) -> bool;
    async fn load(&self) -> Result<()>;
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn ready(&self) -> bool;
    async fn load(&self) -> Result<()>;
    async fn transcribe(&self, wav: &[u8]) -> Result<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentenceEncoder: Send + Sync {
    async fn ready(&self) -> bool;
    async fn load(&self) -> Result<()>;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn ready(&self) -> bool;
    async fn load(&self) -> Result<()>;
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>>;
}

/// The ingest process's host set. The pipeline serializes its calls;
/// hosts are not assumed internally thread-safe beyond that.
#[derive(Clone)]
pub struct ModelHosts {
    pub visual: Arc<dyn VisualEncoder>,
    pub speech: Arc<dyn SpeechToText>,
    pub sentence: Arc<dyn SentenceEncoder>,
    pub face: Arc<dyn FaceDetector>,
}

impl std::fmt::Debug for ModelHosts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHosts").finish_non_exhaustive()
    }
}

impl ModelHosts {
    /// Hosts speaking to the inference sidecar at `base_url`.
    pub fn remote(base_url: &str) -> Self {
        let client = reqwest::Client::new();
        Self {
            visual: Arc::new(RemoteVisualEncoder::new(client.clone(), base_url)),
            speech: Arc::new(RemoteSpeechToText::new(client.clone(), base_url)),
            sentence: Arc::new(RemoteSentenceEncoder::new(client.clone(), base_url)),
            face: Arc::new(RemoteFaceDetector::new(client, base_url)),
        }
    }

    pub async fn readiness(&self) -> ModelReadiness {
        ModelReadiness {
            visual: self.visual.ready().await,
            sentence: self.sentence.ready().await,
        }
    }
}

/// Which query-relevant hosts have completed their first load. The query
/// surface gates semantic features on this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelReadiness {
    pub visual: bool,
    pub sentence: bool,
}

/// Scale a vector to unit length. Zero vectors pass through untouched so
/// a degenerate model output cannot divide by zero downstream.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_untouched() {
        let mut v = vec![0.0f32; 8];
        l2_normalize(&mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn readiness_reflects_query_relevant_hosts() {
        let mut visual = MockVisualEncoder::new();
        visual.expect_ready().returning(|| true);
        let mut sentence = MockSentenceEncoder::new();
        sentence.expect_ready().returning(|| false);

        let hosts = ModelHosts {
            visual: Arc::new(visual),
            speech: Arc::new(MockSpeechToText::new()),
            sentence: Arc::new(sentence),
            face: Arc::new(MockFaceDetector::new()),
        };

        let readiness = hosts.readiness().await;
        assert!(readiness.visual);
        assert!(!readiness.sentence);
    }
}
