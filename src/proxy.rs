//! HTTP client for the remote translation proxy.
//! Two outbound calls: `POST /translate` and `GET /health`. Every failure
//! mode of `translate` (malformed URL, transport error, non-2xx status,
//! undecodable body) collapses into the same untranslated passthrough
//! response, so callers have exactly one code path.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{ContextMessage, Direction};

/// Request body for `POST {base}/translate` (snake_case on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslateRequest {
    pub text: String,
    pub direction: Direction,
    pub chat_id: Option<String>,
    pub context: Vec<ContextMessage>,
}

impl TranslateRequest {
    pub fn new(
        text: impl Into<String>,
        direction: Direction,
        chat_id: Option<&str>,
        context: Vec<ContextMessage>,
    ) -> Self {
        Self {
            text: text.into(),
            direction,
            chat_id: chat_id.map(str::to_string),
            context,
        }
    }
}

/// Response body from `POST {base}/translate`.
///
/// `translation_failed` is the only signal callers may use to distinguish
/// a real translation from a passthrough; on failure `translated_text`
/// always equals the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub original_text: String,
    pub direction: Direction,
    pub translation_failed: bool,
}

impl TranslateResponse {
    /// Untranslated passthrough for a request the proxy could not serve.
    pub fn passthrough(request: &TranslateRequest) -> Self {
        Self {
            translated_text: request.text.clone(),
            original_text: request.text.clone(),
            direction: request.direction,
            translation_failed: true,
        }
    }
}

/// Normalize a user-entered proxy base URL.
/// Trims whitespace and slashes, defaults the scheme to https, drops any
/// query/fragment, and strips trailing `/translate`, `/health`, `/stats`
/// segments users tend to paste from the proxy docs. Idempotent.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    let mut url = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    if let Some(idx) = url.find(['?', '#']) {
        url.truncate(idx);
    }
    let mut url = url.trim_end_matches('/');
    loop {
        let stripped = ["/translate", "/health", "/stats"]
            .iter()
            .find_map(|suffix| url.strip_suffix(suffix));
        match stripped {
            Some(rest) => url = rest,
            None => break,
        }
    }
    url.trim_end_matches('/').to_string()
}

/// Outbound proxy calls, as a seam so the host (and tests) can substitute
/// a double for the real HTTP client.
#[async_trait]
pub trait TranslationProxy: Send + Sync {
    /// Translate `request` against the proxy at `base_url`. Never errors;
    /// any failure yields [`TranslateResponse::passthrough`].
    async fn translate(&self, base_url: &str, request: &TranslateRequest) -> TranslateResponse;

    /// True iff `GET {base}/health` answers 2xx within the timeout.
    async fn check_health(&self, base_url: &str) -> bool;
}

/// Reqwest-backed proxy client.
pub struct ProxyClient {
    http: reqwest::Client,
    translate_timeout: Duration,
    health_timeout: Duration,
}

impl ProxyClient {
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(15), Duration::from_secs(5))
    }

    pub fn with_timeouts(translate_timeout: Duration, health_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            translate_timeout,
            health_timeout,
        }
    }
}

impl Default for ProxyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationProxy for ProxyClient {
    async fn translate(&self, base_url: &str, request: &TranslateRequest) -> TranslateResponse {
        let base = normalize_base_url(base_url);
        if base.is_empty() {
            warn!("translate skipped: proxy base URL not configured");
            return TranslateResponse::passthrough(request);
        }

        let result = self
            .http
            .post(format!("{base}/translate"))
            .timeout(self.translate_timeout)
            .json(request)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => match resp.json::<TranslateResponse>().await
            {
                Ok(parsed) => {
                    debug!(direction = %request.direction, failed = parsed.translation_failed, "translate response received");
                    parsed
                }
                Err(e) => {
                    warn!(error = %e, "translate response body did not decode");
                    TranslateResponse::passthrough(request)
                }
            },
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "translate returned non-success status");
                TranslateResponse::passthrough(request)
            }
            Err(e) => {
                warn!(error = %e, "translate request failed");
                TranslateResponse::passthrough(request)
            }
        }
    }

    async fn check_health(&self, base_url: &str) -> bool {
        let base = normalize_base_url(base_url);
        if base.is_empty() {
            return false;
        }

        let result = self
            .http
            .get(format!("{base}/health"))
            .timeout(self.health_timeout)
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}
