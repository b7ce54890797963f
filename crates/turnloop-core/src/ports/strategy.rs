//! Error-handling strategy port.
//!
//! A strategy decides what happens to the loop when a runtime-level fault
//! (a panic) is intercepted during a task's turn. Each task is bound to one
//! strategy; the default one aborts the run.

use crate::app::{Task, TurnLoop};
use crate::domain::TaskExecutionFault;
use crate::error::LoopError;

/// Reaction to an intercepted fault.
///
/// # Contract
/// - `task` is the task whose turn faulted; its computation is already gone.
/// - Returning `Err` ends `TurnLoop::run` with that error.
/// - Returning `Ok` lets the loop go on with the next task. If the strategy
///   left `task` in the queue, the loop removes it (state `OnError`).
pub trait ErrorHandlingStrategy {
    fn react(
        &self,
        fault: TaskExecutionFault,
        task: &Task,
        scheduler: &TurnLoop,
    ) -> Result<(), LoopError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}
