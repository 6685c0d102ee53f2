//! Error taxonomy surfaced to callers of the command layer.

use crate::transport::TransportFailure;

pub type Result<T> = std::result::Result<T, ClassifiedError>;

/// Why a wait ran out of time.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TimeoutCause {
    #[error("{0}")]
    Transport(#[source] TransportFailure),
    #[error("status polling deadline exceeded after {attempts} checks")]
    Deadline { attempts: u32 },
}

/// Outcome of a failed command execution. Exactly one variant is reported
/// per failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifiedError {
    /// Body was not JSON or matched none of the result shapes. `status` is
    /// the HTTP status it came with, when there was a response.
    #[error("malformed response{}: {reason}", status_note(.status))]
    MalformedResponse { reason: String, status: Option<u16> },

    /// The camera answered with an error payload.
    #[error("device reported error {code}: {message}")]
    DeviceReported { code: String, message: String },

    /// Non-2xx status without an error payload.
    #[error("unexpected http status {status}")]
    HttpStatus { status: u16 },

    #[error("transport error: {0}")]
    Transport(#[source] TransportFailure),

    #[error("timed out: {0}")]
    Timeout(#[source] TimeoutCause),

    /// The request could not be encoded. A bug in the caller, never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the wait for a long-running command.
    #[error("command polling cancelled")]
    Cancelled,
}

fn status_note(status: &Option<u16>) -> String {
    status.map(|code| format!(" (http status {code})")).unwrap_or_default()
}

impl ClassifiedError {
    /// Failures a status check may retry: link trouble, garbled bodies and
    /// bare HTTP errors. A device-reported error is a real command failure.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::MalformedResponse { .. } | Self::HttpStatus { .. } => true,
            Self::Timeout(cause) => matches!(cause, TimeoutCause::Transport(_)),
            Self::DeviceReported { .. } | Self::InvalidRequest(_) | Self::Cancelled => false,
        }
    }

    pub fn device_code(&self) -> Option<&str> {
        match self {
            Self::DeviceReported { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }
}
