//! Records kept after a task leaves the active queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::elapsed::Stopwatch;
use super::fault::TaskExecutionFault;
use super::ids::TaskId;
use super::state::ExecutionState;

/// Outcome of a task whose computation terminated.
///
/// Created once, when the task is seen terminated, and stored apart from
/// the task itself (the task is dropped from the queue at the same moment).
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub id: TaskId,
    pub return_value: Value,
    pub elapsed: Stopwatch,
}

impl TaskResult {
    pub fn new(id: TaskId, return_value: Value, elapsed: Stopwatch) -> Self {
        Self {
            id,
            return_value,
            elapsed,
        }
    }
}

/// Snapshot of a task's execution state after one turn (debug mode only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub state: ExecutionState,
    pub recorded_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn new(id: TaskId, state: ExecutionState, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            state,
            recorded_at,
        }
    }
}

/// A fault a strategy chose to register instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: TaskId,
    pub fault: TaskExecutionFault,
}
