//! turnloop-core
//!
//! Single-threaded cooperative task loop.
//!
//! Callers `defer` computations (async bodies), then `run` the loop: each
//! pass gives every queued task one turn, until all of them finished,
//! aborted themselves or were removed.
//!
//! # モジュール構成
//! - **domain**: ids, states, faults, records, params, stopwatch
//! - **ports**: 差し替え可能な境界（Clock, ErrorHandlingStrategy）
//! - **app**: TurnLoop, Task, Computation, interceptor, registries
//! - **impls**: built-in strategies（ThrowOnError, CancelOnError）
//! - **error**: LoopError

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::{BoxError, LoopConfig, Task, TaskOutput, TurnLoop};
pub use domain::{ExecutionState, LimitAction, Params, RunState, TaskExecutionFault, TaskId, params};
pub use error::LoopError;
pub use impls::{CancelOnError, ThrowOnError};
pub use ports::ErrorHandlingStrategy;
