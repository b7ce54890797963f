use thiserror::Error;

use crate::app::computation::ComputationError;
use crate::domain::{TaskExecutionFault, TaskId, UnknownState};

/// Errors surfaced by `TurnLoop::run` and the loop queries.
#[derive(Debug, Error)]
pub enum LoopError {
    /// A task hit its turn limit without `LimitAction::Abort`.
    #[error("Task with id {id} reached {limit} tries.")]
    MaxTries { id: TaskId, limit: u32 },

    /// A runtime-level fault propagated by the task's strategy.
    #[error("task {id} faulted during its turn: {fault}")]
    Execution {
        id: TaskId,
        #[source]
        fault: TaskExecutionFault,
    },

    /// The task body itself returned an error.
    #[error("task {id} failed: {source}")]
    Task {
        id: TaskId,
        #[source]
        source: ComputationError,
    },

    /// The task lost its computation to an earlier unwinding panic.
    #[error("task {0} cannot resume: its computation was lost to a panic")]
    Poisoned(TaskId),

    #[error("the loop is already running")]
    AlreadyRunning,

    #[error("duplicate task id={0}")]
    DuplicateTaskId(TaskId),

    #[error(transparent)]
    UnknownState(#[from] UnknownState),
}

impl LoopError {
    /// Id of the task the error is about, if any.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            LoopError::MaxTries { id, .. }
            | LoopError::Execution { id, .. }
            | LoopError::Task { id, .. }
            | LoopError::Poisoned(id)
            | LoopError::DuplicateTaskId(id) => Some(id),
            LoopError::AlreadyRunning | LoopError::UnknownState(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tries_message_names_id_and_limit() {
        let err = LoopError::MaxTries {
            id: TaskId::new("test n°1"),
            limit: 3,
        };
        assert_eq!(err.to_string(), "Task with id test n°1 reached 3 tries.");
        assert_eq!(err.task_id().map(TaskId::as_str), Some("test n°1"));
    }

    #[test]
    fn execution_error_exposes_the_fault_as_source() {
        let fault = TaskExecutionFault::unlocated("boom");
        let err = LoopError::Execution {
            id: TaskId::new("a"),
            fault: fault.clone(),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), fault.to_string());
    }
}
