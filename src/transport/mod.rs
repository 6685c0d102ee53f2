pub mod http;

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;

pub use http::HttpTransport;

/// Fixed path every OSC command envelope is posted to.
pub const EXECUTE_PATH: &str = "/osc/commands/execute";
/// Path for checking the state of a long-running command by id.
pub const STATUS_PATH: &str = "/osc/commands/status";

pub type FailureCause = Arc<dyn StdError + Send + Sync>;

/// Raw answer from the device: status code plus the untouched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced an HTTP response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportFailure {
    #[error("request timed out: {0}")]
    Timeout(#[source] FailureCause),
    #[error("connection failed: {0}")]
    Connect(#[source] FailureCause),
    #[error("transport failure: {0}")]
    Other(#[source] FailureCause),
}

impl TransportFailure {
    pub fn timeout(cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::Timeout(Arc::new(cause))
    }

    pub fn connect(cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::Connect(Arc::new(cause))
    }

    pub fn other(cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::Other(Arc::new(cause))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// The underlying error, kept for diagnostics.
    pub fn cause(&self) -> &FailureCause {
        match self {
            Self::Timeout(cause) | Self::Connect(cause) | Self::Other(cause) => cause,
        }
    }
}

/// The only thing the command layer needs from the network: POST a body to a
/// path on the camera and hand back whatever came back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<HttpResponse, TransportFailure>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<HttpResponse, TransportFailure> {
        (**self).post(path, body).await
    }
}
