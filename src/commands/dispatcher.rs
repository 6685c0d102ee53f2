use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info};

use crate::commands::classifier::exchange;
use crate::commands::codec::{CommandRequest, CommandResult};
use crate::commands::poller::{CommandPoller, PollHandle, PollPolicy};
use crate::error::ClassifiedError;
use crate::transport::{Transport, EXECUTE_PATH, STATUS_PATH};

/// What the camera said to a freshly submitted command.
#[derive(Debug)]
pub enum Submitted {
    Done(CommandResult),
    /// The command is still running; the handle waits for or cancels it.
    Running(PollHandle),
}

impl Submitted {
    pub async fn wait(self) -> Result<CommandResult, ClassifiedError> {
        match self {
            Self::Done(result) => Ok(result),
            Self::Running(handle) => handle.wait().await,
        }
    }
}

/// Sends command envelopes to the camera and turns every answer into a
/// result or one classified error.
#[derive(Clone)]
pub struct CommandDispatcher {
    transport: Arc<dyn Transport>,
    poller: CommandPoller,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn Transport>, policy: PollPolicy) -> Self {
        let poller = CommandPoller::new(transport.clone(), policy);
        Self { transport, poller }
    }

    pub fn poller(&self) -> &CommandPoller {
        &self.poller
    }

    /// Execute a command and wait until it is done, using the configured
    /// polling deadline for long-running commands.
    pub async fn execute(&self, request: CommandRequest) -> Result<CommandResult, ClassifiedError> {
        let deadline = self.poller.policy().deadline();
        self.execute_with_deadline(request, deadline).await
    }

    pub async fn execute_with_deadline(
        &self,
        request: CommandRequest,
        deadline: Duration,
    ) -> Result<CommandResult, ClassifiedError> {
        self.submit(request, deadline).await?.wait().await
    }

    /// Send a command once. Long-running commands come back as a
    /// [`PollHandle`] instead of being awaited.
    pub async fn submit(
        &self,
        request: CommandRequest,
        deadline: Duration,
    ) -> Result<Submitted, ClassifiedError> {
        let body = request.encode().map_err(|err| {
            error!(command = %request.name(), error = %err, "failed to encode command envelope");
            ClassifiedError::InvalidRequest(err.to_string())
        })?;

        info!(command = %request.name(), "executing command");
        let result = exchange(self.transport.as_ref(), EXECUTE_PATH, body).await?;

        if result.is_in_progress() {
            debug!(command = %request.name(), id = ?result.id(), "command accepted, still in progress");
            let handle = self.poller.track(request, result, deadline).await;
            return Ok(Submitted::Running(handle));
        }
        Ok(Submitted::Done(result))
    }

    /// One raw status check for the command with the given id.
    pub async fn command_status(&self, id: &str) -> Result<CommandResult, ClassifiedError> {
        let body = serde_json::to_vec(&serde_json::json!({ "id": id }))
            .map_err(|err| ClassifiedError::InvalidRequest(err.to_string()))?;
        exchange(self.transport.as_ref(), STATUS_PATH, body).await
    }
}
