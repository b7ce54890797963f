//! Task - one deferred computation and its execution state machine.
//!
//! A [`Task`] is a cheap handle: the active queue holds one clone, the
//! caller of `TurnLoop::defer` another. The handle keeps answering state
//! queries after the task left the queue; only the computation is dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::computation::{Computation, ComputationError};
use super::config::LoopConfig;
use super::interceptor;
use super::queue::SlotKey;
use super::scheduler::TurnLoop;
use crate::domain::{
    ExecutionState, LimitAction, Params, RunState, Stopwatch, TaskExecutionFault, TaskId, merge,
};
use crate::error::LoopError;
use crate::impls::{CancelOnError, ThrowOnError};
use crate::ports::ErrorHandlingStrategy;

struct TaskCore {
    key: SlotKey,
    id: TaskId,
    parameters: Params,
    turn: u32,
    limit: u32,
    run_state: RunState,
    execution_state: ExecutionState,
    limit_action: LimitAction,
    strategy: Rc<dyn ErrorHandlingStrategy>,
    counter: Stopwatch,
    computation: Option<Computation>,
}

enum Stage {
    Start(Params),
    Resume,
    Complete,
    Poisoned,
}

/// Handle to a deferred task.
#[derive(Clone)]
pub struct Task {
    inner: Rc<RefCell<TaskCore>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.borrow();
        f.debug_struct("Task")
            .field("id", &core.id)
            .field("turn", &core.turn)
            .field("limit", &core.limit)
            .field("run_state", &core.run_state)
            .field("execution_state", &core.execution_state)
            .field("limit_action", &core.limit_action)
            .field("strategy", &core.strategy.name())
            .finish()
    }
}

impl Task {
    pub(crate) fn new(
        key: SlotKey,
        computation: Computation,
        parameters: Params,
        config: &LoopConfig,
    ) -> Self {
        let core = TaskCore {
            key,
            id: TaskId::random(),
            parameters,
            turn: 0,
            limit: config.default_limit,
            run_state: RunState::Run,
            execution_state: ExecutionState::Initial,
            limit_action: config.default_limit_action,
            strategy: Rc::new(ThrowOnError),
            counter: Stopwatch::new(),
            computation: Some(computation),
        };
        Self {
            inner: Rc::new(RefCell::new(core)),
        }
    }

    // ---- configuration ----

    /// Replace the random id.
    pub fn identified_by(self, id: impl Into<TaskId>) -> Self {
        self.inner.borrow_mut().id = id.into();
        self
    }

    /// Number of counted turns after which the limit action applies.
    pub fn set_limit(self, tries: u32) -> Self {
        self.inner.borrow_mut().limit = tries;
        self
    }

    /// Drop the task silently when it reaches its limit.
    pub fn cancel_on_reached_limit(self) -> Self {
        self.inner.borrow_mut().limit_action = LimitAction::Abort;
        self
    }

    /// Fail the run with a max-tries fault when the task reaches its limit.
    pub fn throw_on_reached_limit(self) -> Self {
        self.inner.borrow_mut().limit_action = LimitAction::Throw;
        self
    }

    pub fn cancel_on_error(self) -> Self {
        self.use_on_error(CancelOnError)
    }

    pub fn throw_on_error(self) -> Self {
        self.use_on_error(ThrowOnError)
    }

    pub fn use_on_error(self, strategy: impl ErrorHandlingStrategy + 'static) -> Self {
        self.inner.borrow_mut().strategy = Rc::new(strategy);
        self
    }

    // ---- state ----

    pub fn id(&self) -> TaskId {
        self.inner.borrow().id.clone()
    }

    pub fn key(&self) -> SlotKey {
        self.inner.borrow().key
    }

    pub fn turn(&self) -> u32 {
        self.inner.borrow().turn
    }

    pub fn limit(&self) -> u32 {
        self.inner.borrow().limit
    }

    pub fn limit_action(&self) -> LimitAction {
        self.inner.borrow().limit_action
    }

    pub fn run_state(&self) -> RunState {
        self.inner.borrow().run_state
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.inner.borrow().execution_state
    }

    pub fn set_execution_state(&self, state: ExecutionState) -> &Self {
        self.inner.borrow_mut().execution_state = state;
        self
    }

    pub fn toggle_running_state(&self) {
        let mut core = self.inner.borrow_mut();
        core.run_state = core.run_state.toggled();
    }

    pub(crate) fn set_run_state(&self, state: RunState) {
        self.inner.borrow_mut().run_state = state;
    }

    pub fn parameters(&self) -> Params {
        self.inner.borrow().parameters.clone()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.inner.borrow().strategy.name()
    }

    /// Snapshot of the task's stopwatch.
    pub fn elapsed(&self) -> Stopwatch {
        self.inner.borrow().counter.clone()
    }

    /// Return value of the terminated computation, `Null` otherwise.
    pub fn get_return(&self) -> Value {
        self.inner
            .borrow()
            .computation
            .as_ref()
            .and_then(Computation::get_return)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn is_same(&self, other: &Task) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Take the computation away; the caller drops it.
    pub(crate) fn abandon(&self) -> Option<Computation> {
        self.inner.borrow_mut().computation.take()
    }

    // ---- turn ----

    /// Give the task one turn.
    ///
    /// Returns the value the computation yielded (or returned), the task id
    /// when the task completes, or `Null` when it aborted itself.
    pub fn run(&self, scheduler: &TurnLoop, late: &Params) -> Result<Value, LoopError> {
        self.increment_tries();
        if let Some(outcome) = self.check_limit(scheduler) {
            return outcome;
        }
        self.process(scheduler, late)
    }

    fn increment_tries(&self) {
        let mut core = self.inner.borrow_mut();
        if core.run_state == RunState::Run && core.execution_state.is_started() {
            core.turn += 1;
            trace!(task_id = %core.id, turn = core.turn, limit = core.limit, "turn counted");
        }
    }

    fn check_limit(&self, scheduler: &TurnLoop) -> Option<Result<Value, LoopError>> {
        let (id, limit, action) = {
            let mut core = self.inner.borrow_mut();
            if core.turn < core.limit {
                return None;
            }
            core.counter.cancel();
            core.execution_state = match core.limit_action {
                LimitAction::Abort => ExecutionState::Aborted,
                LimitAction::Throw => ExecutionState::Rejected,
            };
            (core.id.clone(), core.limit, core.limit_action)
        };

        scheduler.cancel(self);
        match action {
            LimitAction::Abort => {
                warn!(task_id = %id, limit, "task aborted on reached limit");
                Some(Ok(Value::Null))
            }
            LimitAction::Throw => {
                warn!(task_id = %id, limit, "task rejected on reached limit");
                Some(Err(LoopError::MaxTries { id, limit }))
            }
        }
    }

    fn process(&self, scheduler: &TurnLoop, late: &Params) -> Result<Value, LoopError> {
        let stage = {
            let mut guard = self.inner.borrow_mut();
            let core = &mut *guard;
            match core.computation.as_ref() {
                None => Stage::Poisoned,
                Some(computation) if !computation.is_started() => {
                    core.execution_state = ExecutionState::Starting;
                    core.counter.start();
                    Stage::Start(merge(&core.parameters, late))
                }
                Some(computation) if !computation.is_terminated() => {
                    core.execution_state = ExecutionState::Resuming;
                    core.counter.restart();
                    Stage::Resume
                }
                Some(_) => {
                    core.counter.stop();
                    core.execution_state = ExecutionState::Complete;
                    Stage::Complete
                }
            }
        };

        match stage {
            Stage::Start(args) => {
                debug!(task_id = %self.id(), "starting task");
                self.step(scheduler, move |computation| computation.start(args))
            }
            Stage::Resume => self.step(scheduler, Computation::resume),
            Stage::Complete => {
                let id = self.id();
                debug!(task_id = %id, elapsed = %self.elapsed().elapsed_time(3), "task complete");
                if let Err(err) = scheduler.add_result_from(self) {
                    self.set_execution_state(ExecutionState::OnError);
                    scheduler.cancel(self);
                    return Err(err);
                }
                scheduler.cancel(self);
                Ok(Value::String(id.to_string()))
            }
            Stage::Poisoned => Err(self.fail_poisoned(scheduler)),
        }
    }

    fn step(
        &self,
        scheduler: &TurnLoop,
        drive: impl FnOnce(&mut Computation) -> Result<Value, ComputationError>,
    ) -> Result<Value, LoopError> {
        let Some(mut computation) = self.abandon() else {
            return Err(self.fail_poisoned(scheduler));
        };

        let polled = if scheduler.is_intercepting() {
            interceptor::intercept(|| drive(&mut computation))
        } else {
            Ok(drive(&mut computation))
        };

        match polled {
            Ok(Ok(value)) => {
                // cancelled during its own turn: the computation is dropped here
                if scheduler.is_active(self) {
                    self.inner.borrow_mut().computation = Some(computation);
                }
                Ok(value)
            }
            Ok(Err(source)) => {
                drop(computation);
                let id = self.id();
                warn!(task_id = %id, error = %source, "task body failed");
                self.set_execution_state(ExecutionState::OnError);
                scheduler.cancel(self);
                Err(LoopError::Task { id, source })
            }
            Err(fault) => {
                drop(computation);
                self.on_fault(fault, scheduler)
            }
        }
    }

    fn on_fault(&self, fault: TaskExecutionFault, scheduler: &TurnLoop) -> Result<Value, LoopError> {
        let strategy = Rc::clone(&self.inner.borrow().strategy);
        debug!(task_id = %self.id(), strategy = strategy.name(), %fault, "fault intercepted");

        let reaction = strategy.react(fault, self, scheduler);

        // a panicked computation cannot be resumed
        if scheduler.is_active(self) {
            self.set_execution_state(ExecutionState::OnError);
            scheduler.cancel(self);
        }
        reaction.map(|()| Value::Null)
    }

    fn fail_poisoned(&self, scheduler: &TurnLoop) -> LoopError {
        self.set_execution_state(ExecutionState::OnError);
        scheduler.cancel(self);
        LoopError::Poisoned(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::queue::ActiveQueue;
    use rstest::rstest;

    fn detached(config: &LoopConfig) -> Task {
        let key = ActiveQueue::new().allocate_key();
        let computation = Computation::new(|_| async { Ok(Value::Null) });
        Task::new(key, computation, Params::new(), config)
    }

    #[test]
    fn fresh_task_uses_loop_defaults() {
        let task = detached(&LoopConfig::default());

        assert_eq!(task.id().as_str().len(), 16);
        assert_eq!(task.turn(), 0);
        assert_eq!(task.limit(), 10);
        assert_eq!(task.limit_action(), LimitAction::Throw);
        assert_eq!(task.run_state(), RunState::Run);
        assert_eq!(task.execution_state(), ExecutionState::Initial);
        assert_eq!(task.strategy_name(), "throw");
    }

    #[test]
    fn configuration_is_fluent() {
        let task = detached(&LoopConfig::default())
            .identified_by("test n°1")
            .set_limit(3)
            .cancel_on_reached_limit()
            .cancel_on_error();

        assert_eq!(task.id(), "test n°1");
        assert_eq!(task.limit(), 3);
        assert_eq!(task.limit_action(), LimitAction::Abort);
        assert_eq!(task.strategy_name(), "cancel");
    }

    #[rstest]
    #[case::abort(LimitAction::Abort)]
    #[case::throw(LimitAction::Throw)]
    fn config_sets_the_limit_action(#[case] action: LimitAction) {
        let config = LoopConfig {
            default_limit: 4,
            default_limit_action: action,
            ..LoopConfig::default()
        };
        let task = detached(&config);
        assert_eq!(task.limit(), 4);
        assert_eq!(task.limit_action(), action);
    }

    #[test]
    fn clones_share_state() {
        let task = detached(&LoopConfig::default());
        let handle = task.clone();

        task.toggle_running_state();
        handle.set_execution_state(ExecutionState::Resuming);

        assert_eq!(handle.run_state(), RunState::Wait);
        assert_eq!(task.execution_state(), ExecutionState::Resuming);
        assert!(task.is_same(&handle));
    }

    #[test]
    fn get_return_is_null_before_termination() {
        let task = detached(&LoopConfig::default());
        assert_eq!(task.get_return(), Value::Null);
    }
}
