use tracing::{debug, warn};

use crate::commands::codec::{self, CodecError, CommandResult};
use crate::error::{ClassifiedError, TimeoutCause};
use crate::transport::{Transport, TransportFailure};

/// Everything known about one request/response exchange.
#[derive(Debug)]
pub enum Exchange {
    /// No HTTP response was received.
    Failed(TransportFailure),
    /// A response came back; `parsed` is the decoded body.
    Answered {
        status: u16,
        parsed: Result<CommandResult, CodecError>,
    },
}

/// Map an exchange to a result or exactly one error kind.
///
/// Rules, first match wins: transport timeout, other transport failure,
/// undecodable body, error payload (whatever the status), non-2xx status,
/// otherwise success. A parsed error payload outranks the status code since
/// cameras send error bodies together with 503.
pub fn classify(exchange: Exchange) -> Result<CommandResult, ClassifiedError> {
    match exchange {
        Exchange::Failed(failure) if failure.is_timeout() => {
            Err(ClassifiedError::Timeout(TimeoutCause::Transport(failure)))
        }
        Exchange::Failed(failure) => Err(ClassifiedError::Transport(failure)),
        Exchange::Answered { status, parsed: Err(err) } => Err(ClassifiedError::MalformedResponse {
            reason: err.to_string(),
            status: Some(status),
        }),
        Exchange::Answered {
            status,
            parsed: Ok(result),
        } => {
            if let Some(payload) = result.error_payload() {
                return Err(ClassifiedError::DeviceReported {
                    code: payload.code.clone(),
                    message: payload.message.clone(),
                });
            }
            if !(200..300).contains(&status) {
                return Err(ClassifiedError::HttpStatus { status });
            }
            Ok(result)
        }
    }
}

/// POST one body and classify what comes back.
pub async fn exchange(
    transport: &dyn Transport,
    path: &str,
    body: Vec<u8>,
) -> Result<CommandResult, ClassifiedError> {
    let exchange = match transport.post(path, body).await {
        Err(failure) => Exchange::Failed(failure),
        Ok(response) => Exchange::Answered {
            status: response.status,
            parsed: codec::decode(&response.body),
        },
    };

    let outcome = classify(exchange);
    match &outcome {
        Ok(result) => debug!(
            path = %path,
            command = %result.name(),
            in_progress = result.is_in_progress(),
            "command exchange succeeded"
        ),
        Err(err) => warn!(path = %path, error = %err, "command exchange failed"),
    }
    outcome
}
