//! Domain model (ids, states, faults, records, params).

pub mod elapsed;
pub mod fault;
pub mod ids;
pub mod params;
pub mod records;
pub mod state;

pub use elapsed::Stopwatch;
pub use fault::{PANIC_CODE, TaskExecutionFault};
pub use ids::TaskId;
pub use params::{Params, merge, params};
pub use records::{ErrorRecord, TaskReport, TaskResult};
pub use state::{ExecutionState, LimitAction, RunState, UnknownState};
