//! Error taxonomy for the digest pipeline.
//!
//! `Fault` lives at the adapter boundary and is absorbed by the orchestrator into
//! `failed_sources`. `DigestError` is what `DigestPipeline::process` hands to the HTTP layer.

use thiserror::Error;

/// Why a single provider call produced no articles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// The bounded per-call (or per-request) timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Connection, DNS or body read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx status that is neither a rate limit nor an auth rejection.
    #[error("HTTP status {code}")]
    Status { code: u16 },

    /// Provider answered 429 (or an equivalent quota message in the body).
    #[error("rate limited by provider")]
    RateLimited,

    /// Provider rejected the credential (401/403 or equivalent).
    #[error("credential rejected")]
    AuthRejected,

    /// Response body did not match the provider envelope.
    #[error("unreadable payload: {0}")]
    Parse(String),

    /// Local admission control denied the call.
    #[error("admission denied by local quota")]
    QuotaExceeded,

    /// The call succeeded but nothing survived normalization.
    #[error("no usable articles")]
    Empty,
}

impl Fault {
    /// Faults worth another attempt under the retry policy.
    pub fn is_transient(&self) -> bool {
        match self {
            Fault::Timeout | Fault::Transport(_) => true,
            Fault::Status { code } => *code >= 500,
            _ => false,
        }
    }

    /// Short machine-friendly label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Timeout => "timeout",
            Fault::Transport(_) => "transport",
            Fault::Status { .. } => "status",
            Fault::RateLimited => "rate_limited",
            Fault::AuthRejected => "auth_rejected",
            Fault::Parse(_) => "parse",
            Fault::QuotaExceeded => "quota_exceeded",
            Fault::Empty => "empty",
        }
    }

    /// Map an HTTP status onto the fault taxonomy. `None` for success codes.
    pub fn from_status(code: u16) -> Option<Self> {
        match code {
            200..=299 => None,
            429 => Some(Fault::RateLimited),
            401 | 403 => Some(Fault::AuthRejected),
            other => Some(Fault::Status { code: other }),
        }
    }
}

impl From<reqwest::Error> for Fault {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Fault::Timeout
        } else if e.is_decode() {
            Fault::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            Fault::from_status(status.as_u16()).unwrap_or(Fault::Status {
                code: status.as_u16(),
            })
        } else {
            Fault::Transport(e.to_string())
        }
    }
}

/// Failure raised by a summarization strategy. Always recovered by the pipeline.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("no content available for summarization")]
    EmptyInput,

    #[error("summarizer is not configured: {0}")]
    NotConfigured(String),

    #[error("remote service error: {0}")]
    Remote(String),

    #[error("local model error: {0}")]
    Model(String),
}

/// Outcome of `DigestPipeline::process` other than a digest.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Every provider failed, was disabled, or returned nothing.
    #[error("No articles found for '{query}'")]
    NoArticlesFound { query: String },

    /// Articles were fetched but none cleared the relevance threshold.
    #[error("No relevant articles found for '{query}'. Try broadening your query.")]
    NoRelevantArticlesFound { query: String },

    /// Anything unclassified. The only case that maps to a 500.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DigestError {
    /// True for the typed empty-result outcomes (404-equivalent).
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            DigestError::NoArticlesFound { .. } | DigestError::NoRelevantArticlesFound { .. }
        )
    }
}
