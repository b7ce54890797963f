//! Built-in error-handling strategies.

use tracing::warn;

use crate::app::{Task, TurnLoop};
use crate::domain::{ExecutionState, TaskExecutionFault};
use crate::error::LoopError;
use crate::ports::ErrorHandlingStrategy;

/// Stop the whole loop and propagate the fault out of `run()`.
///
/// Every task still queued is dropped before the error is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrowOnError;

impl ErrorHandlingStrategy for ThrowOnError {
    fn react(
        &self,
        fault: TaskExecutionFault,
        task: &Task,
        scheduler: &TurnLoop,
    ) -> Result<(), LoopError> {
        task.set_execution_state(ExecutionState::OnError);
        let dropped = scheduler.count_tasks();
        scheduler.abort();
        warn!(task_id = %task.id(), dropped, %fault, "fault aborted the loop");
        Err(LoopError::Execution {
            id: task.id(),
            fault,
        })
    }

    fn name(&self) -> &'static str {
        "throw"
    }
}

/// Drop only the faulting task and keep its fault in the error registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelOnError;

impl ErrorHandlingStrategy for CancelOnError {
    fn react(
        &self,
        fault: TaskExecutionFault,
        task: &Task,
        scheduler: &TurnLoop,
    ) -> Result<(), LoopError> {
        task.set_execution_state(ExecutionState::OnError);
        warn!(task_id = %task.id(), %fault, "fault cancelled the task");
        scheduler.cancel(task).register_error(task.id(), fault);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cancel"
    }
}
