//! Client-side failure type.
//!
//! Everything a run can fail with collapses into [`Failure`], which always
//! renders to a non-empty user-facing message.

use playground_core::{ErrorKind, ErrorReport, FrameError, RetryGuidance};

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// A failure the backend (or this client's framing check) reported.
    #[error("{}", .0.message())]
    Backend(ErrorKind),

    /// The backend reported a kind this build does not know.
    #[error("{}", unrecognized_message(.kind))]
    Unrecognized { kind: Option<String> },

    /// The request never produced a response.
    #[error("Could not reach the compile service: {0}")]
    Transport(#[from] reqwest::Error),

    /// The program was delivered but could not be started.
    #[error("The program failed to load: {0}")]
    Load(String),
}

impl Failure {
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Build output worth showing next to the message.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Failure::Backend(kind) => kind.diagnostic(),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Failure::Backend(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn retry(&self) -> RetryGuidance {
        match self {
            Failure::Backend(kind) => kind.retry(),
            Failure::Unrecognized { .. } | Failure::Transport(_) => RetryGuidance::Later,
            Failure::Load(_) => RetryGuidance::Never,
        }
    }
}

fn unrecognized_message(kind: &Option<String>) -> String {
    ErrorReport::Unrecognized { kind: kind.clone() }.message()
}

impl From<ErrorReport> for Failure {
    fn from(report: ErrorReport) -> Self {
        match report {
            ErrorReport::Known(kind) => Failure::Backend(kind),
            ErrorReport::Unrecognized { kind } => Failure::Unrecognized { kind },
        }
    }
}

impl From<FrameError> for Failure {
    fn from(_: FrameError) -> Self {
        Failure::Backend(ErrorKind::MalformedFrame)
    }
}
