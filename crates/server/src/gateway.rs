//! # VisionGateway — External Proof Classifier Client
//!
//! Submits proof screenshots to an opaque vision classifier and maps its
//! answer onto a three-way verdict, using a trait-abstracted transport.
//!
//! ## Architecture
//!
//! ```text
//! proof image + instruction
//!      │
//!      ▼
//! dyn VisionGateway::classify()
//!      │
//!      ▼
//! Verdict { Confirmed | NotConfirmed | Indeterminate }
//! ```
//!
//! ## Verdict vs Error
//!
//! A readable "no" from the classifier is a [`Verdict::NotConfirmed`], not
//! an error. [`GatewayError`] is reserved for transport-level failure
//! (unreachable, timed out, unconfigured). Output the classifier produced
//! but we cannot interpret is [`Verdict::Indeterminate`]; the caller must
//! not mutate any state on it.
//!
//! ## No Implicit Retry
//!
//! One attempt per call. Retry policy belongs to the client resubmitting
//! the form, never to this layer.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use cointask_common::ActionKind;

// ════════════════════════════════════════════════════════════════════════════
// VERDICT
// ════════════════════════════════════════════════════════════════════════════

/// Three-way classifier outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Classifier affirmed the claimed action is visible in the image.
    Confirmed,
    /// Classifier read the image and answered no.
    NotConfirmed,
    /// Classifier responded but the answer is unusable (malformed payload,
    /// content-safety refusal). No state may change on this verdict.
    Indeterminate,
}

// ════════════════════════════════════════════════════════════════════════════
// ERROR
// ════════════════════════════════════════════════════════════════════════════

/// Transport-level gateway failures. Business outcomes are [`Verdict`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Classifier unreachable, or no classifier configured at all.
    Unavailable(String),
    /// Request exceeded the configured timeout.
    Timeout,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "vision gateway unavailable: {}", msg),
            Self::Timeout => write!(f, "vision gateway timed out"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ════════════════════════════════════════════════════════════════════════════
// GATEWAY TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// Async classifier abstraction. Object-safe, `Send + Sync`.
///
/// ## Contract
///
/// - Implementations MUST NOT retry internally.
/// - Implementations MUST NOT panic.
/// - Timeouts surface as [`GatewayError::Timeout`].
#[async_trait]
pub trait VisionGateway: Send + Sync {
    async fn classify(&self, image: &[u8], instruction: &str) -> Result<Verdict, GatewayError>;
}

/// Build the per-kind classifier instruction. For comment verification the
/// target username narrows the question to the submitting user.
#[must_use]
pub fn instruction_for(kind: ActionKind, username: Option<&str>) -> String {
    match (kind, username) {
        (ActionKind::Comment, Some(name)) => format!(
            "Does this screenshot show a comment posted by the user '{}' on the advertised content? Answer yes or no.",
            name
        ),
        (ActionKind::Comment, None) => {
            "Does this screenshot show a comment posted on the advertised content? Answer yes or no."
                .to_string()
        }
        (ActionKind::Like, _) => {
            "Does this screenshot show that the user has liked the advertised content? Answer yes or no."
                .to_string()
        }
        (ActionKind::Share, _) => {
            "Does this screenshot show that the user has shared the advertised content? Answer yes or no."
                .to_string()
        }
        (ActionKind::Subscribe, _) => {
            "Does this screenshot show that the user has subscribed to the advertised channel? Answer yes or no."
                .to_string()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP GATEWAY
// ════════════════════════════════════════════════════════════════════════════

/// Production gateway speaking JSON to the external classifier endpoint.
///
/// Request: `{"instruction": ..., "image_hex": ...}`.
/// Expected reply: `{"verdict": "yes" | "no"}` — anything else is
/// [`Verdict::Indeterminate`].
pub struct HttpVisionGateway {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpVisionGateway {
    pub fn new(
        url: String,
        token: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl VisionGateway for HttpVisionGateway {
    async fn classify(&self, image: &[u8], instruction: &str) -> Result<Verdict, GatewayError> {
        let body = json!({
            "instruction": instruction,
            "image_hex": hex::encode(image),
        });
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Unavailable(e.to_string())
            }
        })?;

        if resp.status().is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "classifier returned {}",
                resp.status()
            )));
        }

        // 4xx and unreadable bodies mean the classifier could not answer
        // the question; treat as indeterminate rather than unavailable.
        let payload: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable classifier reply");
                return Ok(Verdict::Indeterminate);
            }
        };
        match payload.get("verdict").and_then(Value::as_str) {
            Some("yes") => Ok(Verdict::Confirmed),
            Some("no") => Ok(Verdict::NotConfirmed),
            other => {
                tracing::warn!(?other, "unexpected classifier verdict");
                Ok(Verdict::Indeterminate)
            }
        }
    }
}

/// Stand-in used when no classifier endpoint is configured: every call
/// fails as unavailable, so verification answers 503 instead of lying.
pub struct UnconfiguredGateway;

#[async_trait]
impl VisionGateway for UnconfiguredGateway {
    async fn classify(&self, _image: &[u8], _instruction: &str) -> Result<Verdict, GatewayError> {
        Err(GatewayError::Unavailable(
            "no vision classifier configured".to_string(),
        ))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK GATEWAY
// ════════════════════════════════════════════════════════════════════════════

/// Mock gateway for tests. Scripted results are consumed in FIFO order;
/// an empty queue answers `GatewayError::Unavailable`, which also makes it
/// a sentinel for "the gateway must not be consulted on this path".
pub struct MockVisionGateway {
    script: Mutex<Vec<Result<Verdict, GatewayError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockVisionGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a verdict (FIFO). A poisoned mutex drops the push silently.
    pub fn push_verdict(&self, verdict: Verdict) {
        if let Ok(mut q) = self.script.lock() {
            q.push(Ok(verdict));
        }
    }

    pub fn push_error(&self, err: GatewayError) {
        if let Ok(mut q) = self.script.lock() {
            q.push(Err(err));
        }
    }

    /// Instructions received so far, in call order.
    #[must_use]
    pub fn seen_instructions(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockVisionGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionGateway for MockVisionGateway {
    async fn classify(&self, _image: &[u8], instruction: &str) -> Result<Verdict, GatewayError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(instruction.to_string());
        }
        let mut q = self
            .script
            .lock()
            .map_err(|e| GatewayError::Unavailable(format!("mutex poisoned: {}", e)))?;
        if q.is_empty() {
            return Err(GatewayError::Unavailable("no scripted verdict".to_string()));
        }
        q.remove(0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════
