//! Raw API responses and failure classification for operator guidance.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

/// A completed HTTP exchange. Any status is possible; callers decide policy.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// Only a plain 200 counts as success upstream.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Parse the body as JSON, returning `None` when it is not valid JSON.
    pub fn json(&self) -> Option<Value> {
        match serde_json::from_str(&self.body) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(status = %self.status, error = %e, "response body is not JSON");
                None
            }
        }
    }
}

/// Why a request did not produce a usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFailure {
    /// No response at all after every retry (connection error, timeout).
    Transport,
    /// The signature or session cookie was rejected.
    Credentials(StatusCode),
    /// Any other non-200 status.
    Http(StatusCode),
}

impl ResponseFailure {
    /// Classify a send result. Returns `None` for a 200 response.
    pub fn classify(response: Option<&ApiResponse>) -> Option<Self> {
        let response = match response {
            Some(r) => r,
            None => return Some(Self::Transport),
        };
        if response.is_ok() {
            return None;
        }
        match response.status.as_u16() {
            // 461 and 406 are what the upstream gateway answers to bad signatures.
            401 | 403 | 406 | 461 => Some(Self::Credentials(response.status)),
            _ => Some(Self::Http(response.status)),
        }
    }

    /// Actionable guidance for the operator.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Transport => "network unreachable or timing out; check connectivity",
            Self::Credentials(_) => {
                "signature or cookie rejected; refresh the session cookie or try another account"
            }
            Self::Http(_) => "unexpected HTTP status from upstream",
        }
    }
}

impl std::fmt::Display for ResponseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "no response"),
            Self::Credentials(status) => write!(f, "credentials rejected (HTTP {status})"),
            Self::Http(status) => write!(f, "HTTP {status}"),
        }
    }
}
