// Remote embedding client
// One request shape serves both index-time and query-time embedding; there
// is no separate "document" vs "query" mode.


use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::{RagError, Result};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Whether the most recent embedding call succeeded. Reported by the status
/// endpoint; starts optimistic until a call proves otherwise.
static EMBEDDING_HEALTHY: AtomicBool = AtomicBool::new(true);

#[inline]
pub fn embedding_healthy() -> bool {
    EMBEDDING_HEALTHY.load(Ordering::Relaxed)
}

fn record_health(ok: bool) {
    EMBEDDING_HEALTHY.store(ok, Ordering::Relaxed);
}

/// Seam for vector production so indexing and retrieval can be tested
/// without a remote model.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Tag of the model producing the vectors, recorded in store snapshots.
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<EmbeddingInput<'a>>,
}

#[derive(Serialize)]
struct EmbeddingInput<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// The multimodal endpoint nests the vector under `data[0].embedding`, but
/// some deployments return a bare top-level `embedding`; accept both.
#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Blocking client for the remote embedding endpoint, with a fixed 60 s
/// deadline per call.
#[derive(Debug, Clone)]
pub struct ArkEmbeddingClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ArkEmbeddingClient {
    #[inline]
    pub fn new(config: &Config) -> Self {
        Self::with_timeout(config, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
    }

    #[inline]
    pub fn with_timeout(config: &Config, timeout: Duration) -> Self {
        let endpoint = format!(
            "{}/embeddings/multimodal",
            config.base_url.trim_end_matches('/')
        );
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint,
            model: config.embed_model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

impl Embedder for ArkEmbeddingClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("Missing ARK_API_KEY for embeddings".to_string()))?;

        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![EmbeddingInput { kind: "text", text }],
        };
        let body = serde_json::to_string(&request).map_err(|err| {
            RagError::Format(format!("failed to serialize embedding request: {err}"))
        })?;

        let started = Instant::now();
        let outcome = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string());

        let raw = match outcome {
            Ok(raw) => {
                record_health(true);
                raw
            }
            Err(err) => {
                record_health(false);
                return Err(RagError::Transport(format!("embedding call failed: {err}")));
            }
        };

        debug!(
            "Embedded {} chars with {} in {}ms",
            text.chars().count(),
            self.model,
            started.elapsed().as_millis()
        );

        let response: EmbeddingResponse = serde_json::from_str(&raw)
            .map_err(|_| RagError::Format(format!("unexpected embeddings response: {raw}")))?;

        response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .or(response.embedding)
            .ok_or_else(|| {
                RagError::Format("embeddings response contained no vector".to_string())
            })
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }
}
