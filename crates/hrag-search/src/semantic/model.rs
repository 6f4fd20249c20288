use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use hrag_core::config::{EmbedderBackend, EmbedderConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Longest input sent to a remote embedding backend, in bytes.
const MAX_EMBED_INPUT: usize = 12_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbedError {
    /// The backend could not be reached. Worth retrying.
    #[error("embedding backend unreachable: {0}")]
    Unavailable(String),

    #[error("embedding request rejected: {0}")]
    Rejected(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

/// Text to fixed-length vector. Documents and queries must go through the
/// same embedder for similarity scores to mean anything.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the embedding space, recorded in the index.
    fn model_id(&self) -> String;

    fn dimension(&self) -> usize;

    /// # Errors
    ///
    /// Returns [`EmbedError`] when the backend fails or returns a vector of
    /// the wrong length.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Batch inference. Defaults to one call per text.
    ///
    /// # Errors
    ///
    /// The first error from [`Embedder::embed`].
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Build the embedder named by config.
///
/// # Errors
///
/// Returns an error when the backend cannot be initialized, e.g. the
/// embedding service does not answer its health check.
pub fn build_embedder(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbedderBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        EmbedderBackend::Ollama => Ok(Arc::new(OllamaEmbedder::connect(
            &config.base_url,
            &config.model,
            config.dimension,
        )?)),
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedder
// ---------------------------------------------------------------------------

/// Deterministic feature-hashing embedder.
///
/// Lowercased word unigrams and bigrams are hashed into `dimension` signed
/// buckets and the result is L2-normalized. No model files, no network.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// # Errors
    ///
    /// Returns an error for a zero dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            bail!("hashing embedder dimension must be at least 1");
        }
        Ok(Self { dimension })
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = blake3::hash(feature.as_bytes());
        let bytes = digest.as_bytes();
        let mut word = [0_u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let h = u64::from_le_bytes(word);

        let bucket = usize::try_from(h % self.dimension as u64).unwrap_or_default();
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> String {
        format!("hashing-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0_f32; self.dimension];

        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// OllamaEmbedder
// ---------------------------------------------------------------------------

/// Embeddings from a local Ollama server (`POST /api/embeddings`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Create a client and verify the server answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) or the health check fails.
    pub fn connect(base_url: &str, model: &str, dimension: usize) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("embedder base_url must be http(s), got '{base_url}'");
        }
        if model.trim().is_empty() {
            bail!("embedder model must not be empty");
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        let embedder = Self {
            agent,
            base_url,
            model: model.to_string(),
            dimension,
        };
        embedder.health_check()?;
        Ok(embedder)
    }

    fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .agent
            .get(&url)
            .timeout(Duration::from_millis(800))
            .call()
            .with_context(|| format!("failed to reach embedding service at {}", self.base_url))?;
        if resp.status() != 200 {
            bail!("embedding service health check returned status {}", resp.status());
        }
        debug!(model = %self.model, "embedding service reachable");
        Ok(())
    }
}

impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, EmbedError> {
        let prompt = truncate_to_boundary(input, MAX_EMBED_INPUT);
        let url = format!("{}/api/embeddings", self.base_url);
        let req = EmbeddingsRequest {
            model: &self.model,
            prompt,
        };

        let resp = match self.agent.post(&url).send_json(&req) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, _)) if code >= 500 => {
                return Err(EmbedError::Unavailable(format!("status {code}")));
            }
            Err(ureq::Error::Status(code, _)) => {
                return Err(EmbedError::Rejected(format!("status {code}")));
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(EmbedError::Unavailable(t.to_string()));
            }
        };

        let body: EmbeddingsResponse = resp
            .into_json()
            .map_err(|e| EmbedError::Rejected(format!("undecodable response: {e}")))?;
        if body.embedding.len() != self.dimension {
            return Err(EmbedError::Dimension {
                expected: self.dimension,
                actual: body.embedding.len(),
            });
        }
        Ok(body.embedding)
    }
}

fn truncate_to_boundary(input: &str, max: usize) -> &str {
    if input.len() <= max {
        return input;
    }
    let mut end = max;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64).expect("embedder");
        let a = embedder.embed("High churn in 5G plans").expect("embed");
        let b = embedder.embed("high CHURN in 5g plans!").expect("embed");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_scores_above_unrelated_text() {
        let embedder = HashingEmbedder::new(384).expect("embedder");
        let query = embedder.embed("churn in premium 5G plans").expect("embed");
        let near = embedder
            .embed("High churn observed in 5G premium plans in metro regions.")
            .expect("embed");
        let far = embedder
            .embed("Network congestion in Mumbai due to spectrum constraints.")
            .expect("embed");
        assert!(cosine(&query, &near) > cosine(&query, &far));
    }

    #[test]
    fn text_without_tokens_embeds_to_zero() {
        let embedder = HashingEmbedder::new(16).expect("embedder");
        let v = embedder.embed("?!").expect("embed");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn model_id_names_the_space() {
        let embedder = HashingEmbedder::new(384).expect("embedder");
        assert_eq!(embedder.model_id(), "hashing-384");
    }

    #[test]
    fn ollama_rejects_non_http_urls() {
        let err = OllamaEmbedder::connect("ftp://127.0.0.1:11434", "all-minilm", 384).unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn ollama_unreachable_fails_construction() {
        // Port 9 (discard) is closed on test machines.
        let err = OllamaEmbedder::connect("http://127.0.0.1:9", "all-minilm", 384).unwrap_err();
        assert!(format!("{err:#}").contains("failed to reach embedding service"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(10);
        let cut = truncate_to_boundary(&text, 5);
        assert_eq!(cut, "éé");
    }
}
