//! Timing and normalization boundary around the external command dispatcher.

use crate::error::{MenuError, Result};
use crate::logging::OperationTimer;
use crate::models::{
    CommandFailure, CommandOutput, CommandRequest, ErrorDetails, ExecutionResult,
};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Names the menu handles itself; they never reach a dispatcher.
pub const RESERVED_COMMANDS: [&str; 4] = ["history", "config", "help", "exit"];

pub fn is_reserved(command: &str) -> bool {
    RESERVED_COMMANDS.contains(&command)
}

/// The external side that actually runs commands.
pub trait CommandDispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        request: CommandRequest,
    ) -> impl Future<Output = std::result::Result<CommandOutput, CommandFailure>> + Send;
}

/// Runs one command through the dispatcher and turns whatever comes back,
/// including a panic, into an [`ExecutionResult`]. No retries.
pub struct CommandExecutor<D> {
    dispatcher: Arc<D>,
}

impl<D> Clone for CommandExecutor<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<D: CommandDispatcher> CommandExecutor<D> {
    pub fn new(dispatcher: D) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Rejects requests no dispatcher should ever see.
    ///
    /// # Errors
    ///
    /// `MenuError::EmptyCommand` for a blank name, `MenuError::ReservedCommand`
    /// for one of [`RESERVED_COMMANDS`].
    pub fn validate(request: &CommandRequest) -> Result<()> {
        let command = request.command.trim();
        if command.is_empty() {
            return Err(MenuError::EmptyCommand);
        }
        if is_reserved(command) {
            return Err(MenuError::ReservedCommand(command.to_string()));
        }
        Ok(())
    }

    /// Dispatches `request` and measures it.
    ///
    /// Only caller errors are returned as `Err`; a failing or panicking command
    /// comes back as an unsuccessful `ExecutionResult`.
    pub async fn execute(&self, request: CommandRequest) -> Result<ExecutionResult> {
        Self::validate(&request)?;
        let command = request.command.clone();
        info!(%command, args = ?request.args, "Executing command");

        let timer = OperationTimer::start("command");
        let started_at = Utc::now();
        let dispatcher = Arc::clone(&self.dispatcher);
        let joined = tokio::spawn(async move { dispatcher.dispatch(request).await }).await;
        let duration = timer.finish();

        let outcome = joined.unwrap_or_else(|e| Err(failure_from_join_error(e)));
        let result = normalize(command, started_at, duration, outcome);
        if result.success {
            info!(command = %result.command, duration_ms = result.duration, "Command succeeded");
        } else {
            warn!(
                command = %result.command,
                exit_code = result.exit_code,
                message = %result.message,
                "Command failed"
            );
        }
        Ok(result)
    }
}

/// Folds a dispatcher outcome into the common result shape.
///
/// A reported failure keeps its own non-zero exit code, or gets 1. An output
/// that says `success: false` is treated as a failure with exit code 1.
pub fn normalize(
    command: String,
    started_at: DateTime<Utc>,
    duration: Duration,
    outcome: std::result::Result<CommandOutput, CommandFailure>,
) -> ExecutionResult {
    let duration = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    match outcome {
        Ok(output) if output.success => ExecutionResult {
            command,
            success: true,
            message: output.message,
            timestamp: started_at,
            duration,
            exit_code: 0,
            data: output.data,
            error: None,
        },
        Ok(output) => ExecutionResult {
            command,
            success: false,
            error: Some(ErrorDetails::new(output.message.clone())),
            message: output.message,
            timestamp: started_at,
            duration,
            exit_code: 1,
            data: output.data,
        },
        Err(failure) => ExecutionResult {
            command,
            success: false,
            exit_code: failure.exit_code.filter(|code| *code != 0).unwrap_or(1),
            error: Some(ErrorDetails {
                message: failure.message.clone(),
                stack: failure.stack,
                code: failure.code,
            }),
            message: failure.message,
            timestamp: started_at,
            duration,
            data: None,
        },
    }
}

fn failure_from_join_error(e: JoinError) -> CommandFailure {
    if e.is_cancelled() {
        return CommandFailure::new("command was cancelled").code("CANCELLED");
    }
    let message = panic_message(e.into_panic());
    debug!(%message, "Dispatcher panicked");
    CommandFailure::new(message).code("PANIC")
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "command panicked".to_string()),
    }
}
