//! Error taxonomy — the closed set of failures a compile round trip can
//! report, and how each one is presented to a user.
//!
//! Backend failures travel as a tagged JSON object:
//!
//! ```json
//! { "kind": "BuildFailed", "stdout": "...", "stderr": "..." }
//! ```
//!
//! `MalformedFrame` and `MethodNotAllowed` are raised locally (client
//! framing check, gateway method filter) but share the same shape so a
//! caller only ever handles one type.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fallback shown for a failure whose kind this build does not know.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred";

/// Every failure kind the playground can report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum ErrorKind {
    /// The caller is throttled for `time_left` more seconds.
    #[error("rate limited for {time_left}s")]
    RateLimit { time_left: f64 },

    /// Platform-level throttle in front of the backend.
    #[serde(alias = "CFRateLimit")]
    #[error("rate limited by the edge")]
    EdgeRateLimit,

    /// The caller already has a compile in flight.
    #[error("a request from this caller is already active")]
    ActiveRequestExists,

    /// The source contains a token rejected by the policy filter.
    #[serde(alias = "DisallowedWord")]
    #[error("disallowed content: {word}")]
    DisallowedContent { word: String },

    /// The compiler rejected the source.
    #[error("build failed")]
    BuildFailed { stdout: String, stderr: String },

    /// The backend ran out of capacity.
    #[error("backend overloaded")]
    Overloaded,

    /// Unexpected backend or server fault.
    #[error("internal error")]
    Internal,

    /// Response framing lengths did not fit the body.
    #[error("malformed response frame")]
    MalformedFrame,

    /// The gateway received a verb it does not serve.
    #[error("method not allowed")]
    MethodNotAllowed,
}

/// What a caller may do after a failure. The core never retries by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryGuidance {
    /// Retry once the given delay has elapsed.
    After(Duration),
    /// Retry after a short pause.
    ShortDelay,
    /// Wait for the in-flight request to finish first.
    AwaitCompletion,
    /// Retrying the same input cannot succeed; the source must change.
    EditRequired,
    /// Retry with exponential backoff.
    Backoff,
    /// Retry at some later point.
    Later,
    /// Do not retry.
    Never,
}

impl ErrorKind {
    /// Stable tag used on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit { .. } => "RateLimit",
            ErrorKind::EdgeRateLimit => "EdgeRateLimit",
            ErrorKind::ActiveRequestExists => "ActiveRequestExists",
            ErrorKind::DisallowedContent { .. } => "DisallowedContent",
            ErrorKind::BuildFailed { .. } => "BuildFailed",
            ErrorKind::Overloaded => "Overloaded",
            ErrorKind::Internal => "Internal",
            ErrorKind::MalformedFrame => "MalformedFrame",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
        }
    }

    /// User-facing text for this failure.
    pub fn message(&self) -> String {
        match self {
            ErrorKind::RateLimit { time_left } => {
                format!("Please wait {}s before submitting another request", time_left.ceil())
            }
            ErrorKind::EdgeRateLimit => "Please wait before submitting another request".into(),
            ErrorKind::ActiveRequestExists => {
                "A request from you is currently being handled, please wait until it is complete"
                    .into()
            }
            ErrorKind::DisallowedContent { word } => {
                format!("Your code contains a disallowed word: \"{word}\"")
            }
            ErrorKind::BuildFailed { .. } => "The code failed to build".into(),
            ErrorKind::Overloaded => {
                "The server failed to process your request due to being overloaded".into()
            }
            ErrorKind::Internal => "An internal server error occurred".into(),
            ErrorKind::MalformedFrame => {
                "The server sent a response that could not be understood".into()
            }
            ErrorKind::MethodNotAllowed => "This request method is not supported".into(),
        }
    }

    /// Text worth showing next to the message, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ErrorKind::BuildFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn retry(&self) -> RetryGuidance {
        match self {
            ErrorKind::RateLimit { time_left } => {
                RetryGuidance::After(Duration::try_from_secs_f64(*time_left).unwrap_or_default())
            }
            ErrorKind::EdgeRateLimit => RetryGuidance::ShortDelay,
            ErrorKind::ActiveRequestExists => RetryGuidance::AwaitCompletion,
            ErrorKind::DisallowedContent { .. } | ErrorKind::BuildFailed { .. } => {
                RetryGuidance::EditRequired
            }
            ErrorKind::Overloaded => RetryGuidance::Backoff,
            ErrorKind::Internal => RetryGuidance::Later,
            ErrorKind::MalformedFrame | ErrorKind::MethodNotAllowed => RetryGuidance::Never,
        }
    }

    /// HTTP status a server uses when reporting this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::RateLimit { .. }
            | ErrorKind::EdgeRateLimit
            | ErrorKind::ActiveRequestExists => 429,
            ErrorKind::DisallowedContent { .. } | ErrorKind::BuildFailed { .. } => 400,
            ErrorKind::Overloaded => 503,
            ErrorKind::Internal => 500,
            ErrorKind::MalformedFrame => 502,
            ErrorKind::MethodNotAllowed => 405,
        }
    }

    /// JSON body for this kind.
    pub fn to_body(&self) -> Vec<u8> {
        // A derived Serialize over strings and floats cannot fail.
        serde_json::to_vec(self).unwrap_or_else(|_| br#"{"kind":"Internal"}"#.to_vec())
    }
}

// ── Parsing failure bodies ────────────────────────────────────────────────────

/// A failure body as understood by this build.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorReport {
    Known(ErrorKind),
    /// The body named a kind this build does not know, or none at all.
    Unrecognized { kind: Option<String> },
}

impl ErrorReport {
    /// Interpret a non-2xx response body.
    pub fn parse(body: &[u8]) -> Self {
        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(_) => return ErrorReport::Unrecognized { kind: None },
        };
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .map(str::to_string);
        match serde_json::from_value::<ErrorKind>(value) {
            Ok(known) => ErrorReport::Known(known),
            Err(_) => ErrorReport::Unrecognized { kind },
        }
    }

    /// User-facing text; never empty.
    pub fn message(&self) -> String {
        match self {
            ErrorReport::Known(kind) => kind.message(),
            ErrorReport::Unrecognized { kind: Some(kind) } if !kind.is_empty() => {
                format!("{GENERIC_FAILURE_MESSAGE}: {kind}")
            }
            ErrorReport::Unrecognized { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ErrorReport::Known(kind) => kind.diagnostic(),
            ErrorReport::Unrecognized { .. } => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
