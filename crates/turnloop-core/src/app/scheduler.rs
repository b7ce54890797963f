//! TurnLoop - round-robin driver of deferred tasks.
//!
//! # 実行モデル
//! - single thread, cooperative: a task only gives control back at `next()`
//!   (or when its body finishes)
//! - one pass gives every queued task exactly one turn, in queue order
//! - `run()` repeats passes until the queue is empty or a fault propagates

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::computation::{Computation, Suspend, TaskOutput, suspend};
use super::config::LoopConfig;
use super::interceptor::TaskErrorInterceptor;
use super::queue::{ActiveQueue, SlotKey};
use super::registry::{ErrorRegistry, ReportRegistry, ResultRegistry};
use super::status::LoopStatus;
use super::task::Task;
use crate::domain::{
    ExecutionState, Params, RunState, Stopwatch, TaskExecutionFault, TaskId, TaskReport,
    TaskResult,
};
use crate::error::LoopError;
use crate::ports::{Clock, SystemClock};

struct LoopInner {
    config: LoopConfig,
    debug: Cell<bool>,
    tasks: RefCell<ActiveQueue>,
    results: RefCell<ResultRegistry>,
    errors: RefCell<ErrorRegistry>,
    reports: RefCell<ReportRegistry>,
    counter: RefCell<Stopwatch>,
    interceptor: TaskErrorInterceptor,
    current: RefCell<Option<Task>>,
    running: Cell<bool>,
    clock: Box<dyn Clock>,
}

/// Handle to a cooperative task loop.
///
/// Clones share the same loop, so a task body can capture one to call
/// `next`, `wait`, `defer` or `cancel` while the loop drives it.
///
/// # Example
/// ```
/// use serde_json::json;
/// use turnloop_core::{Params, TurnLoop};
///
/// let lp = TurnLoop::new();
/// let inner = lp.clone();
/// lp.defer(
///     move |_| async move {
///         inner.next(json!("halfway")).await;
///         Ok(json!(2))
///     },
///     Params::new(),
/// )
/// .identified_by("second");
///
/// lp.run(Params::new()).unwrap();
/// assert_eq!(lp.return_of("second"), Some(json!(2)));
/// ```
#[derive(Clone)]
pub struct TurnLoop {
    inner: Rc<LoopInner>,
}

impl Default for TurnLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a `TurnLoop` with a custom configuration or clock.
pub struct TurnLoopBuilder {
    config: LoopConfig,
    clock: Box<dyn Clock>,
}

impl TurnLoopBuilder {
    pub fn new() -> Self {
        Self {
            config: LoopConfig::default(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn build(self) -> TurnLoop {
        let interceptor = TaskErrorInterceptor::new();
        if self.config.handle_errors {
            interceptor.on();
        }
        let inner = LoopInner {
            debug: Cell::new(self.config.debug),
            config: self.config,
            tasks: RefCell::new(ActiveQueue::new()),
            results: RefCell::new(ResultRegistry::new()),
            errors: RefCell::new(ErrorRegistry::new()),
            reports: RefCell::new(ReportRegistry::new()),
            counter: RefCell::new(Stopwatch::new()),
            interceptor,
            current: RefCell::new(None),
            running: Cell::new(false),
            clock: self.clock,
        };
        TurnLoop {
            inner: Rc::new(inner),
        }
    }
}

impl Default for TurnLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets the per-run state on every exit path, unwinding included.
struct RunGuard<'a> {
    inner: &'a LoopInner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut counter) = self.inner.counter.try_borrow_mut() {
            counter.stop();
        }
        if let Ok(mut current) = self.inner.current.try_borrow_mut() {
            current.take();
        }
        self.inner.running.set(false);
    }
}

impl TurnLoop {
    pub fn new() -> Self {
        TurnLoopBuilder::new().build()
    }

    pub fn with_config(config: LoopConfig) -> Self {
        TurnLoopBuilder::new().config(config).build()
    }

    pub fn builder() -> TurnLoopBuilder {
        TurnLoopBuilder::new()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    // ---- setup ----

    /// Record a report for every task after each of its turns.
    pub fn debug(&self) -> &Self {
        self.inner.debug.set(true);
        self
    }

    pub fn is_debug(&self) -> bool {
        self.inner.debug.get()
    }

    /// Route panics raised during a turn to the task's error strategy.
    ///
    /// Takes effect at the next `run()`.
    pub fn handle_errors(&self) -> &Self {
        self.inner.interceptor.on();
        self
    }

    /// Queue a computation.
    ///
    /// `func` receives `params` merged with the late parameters of `run()`
    /// when the task gets its first turn. The returned handle configures the
    /// task; it may be used before or during the run.
    pub fn defer<F, Fut>(&self, func: F, params: Params) -> Task
    where
        F: FnOnce(Params) -> Fut + 'static,
        Fut: Future<Output = TaskOutput> + 'static,
    {
        let computation = Computation::new(func);
        let task = {
            let mut tasks = self.inner.tasks.borrow_mut();
            let key = tasks.allocate_key();
            let task = Task::new(key, computation, params, &self.inner.config);
            tasks.push(task.clone());
            task
        };
        debug!(task_id = %task.id(), queued = self.count_tasks(), "task deferred");
        task
    }

    // ---- queue control ----

    /// Remove a task from the queue without recording a result.
    ///
    /// A task removed while still active ends up `Cancelled`; its
    /// computation is dropped where it stands.
    pub fn cancel(&self, task: &Task) -> &Self {
        let removed = self.inner.tasks.borrow_mut().remove(task.key());
        if let Some(removed) = removed {
            Self::discard(&removed);
            debug!(task_id = %removed.id(), state = %removed.execution_state(), "task removed");
        }
        self
    }

    /// Remove every task from the queue.
    pub fn abort(&self) -> &Self {
        let drained = self.inner.tasks.borrow_mut().drain();
        if !drained.is_empty() {
            debug!(dropped = drained.len(), "queue aborted");
        }
        for task in &drained {
            Self::discard(task);
        }
        self
    }

    fn discard(task: &Task) {
        if task.execution_state().is_active() {
            task.set_execution_state(ExecutionState::Cancelled);
        }
        let abandoned = task.abandon();
        drop(abandoned);
    }

    pub fn count_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn is_active(&self, task: &Task) -> bool {
        self.inner.tasks.borrow().contains(task.key())
    }

    /// Active task with the given id.
    pub fn find(&self, id: impl Into<TaskId>) -> Option<Task> {
        let id = id.into();
        self.inner
            .tasks
            .borrow()
            .find(|task| task.id() == id)
            .cloned()
    }

    /// The task whose turn is in progress.
    pub fn current(&self) -> Option<Task> {
        self.inner.current.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    pub(crate) fn is_intercepting(&self) -> bool {
        self.inner.interceptor.is_registered()
    }

    // ---- inside task bodies ----

    /// Yield `value` and give control back to the loop.
    ///
    /// The body continues after the `.await` on its next turn.
    pub fn next(&self, value: Value) -> Suspend {
        suspend(value)
    }

    /// Keep yielding until `seconds` of wall-clock time have passed.
    ///
    /// The current task's turns are not counted meanwhile, so a long wait
    /// does not hit the turn limit.
    pub async fn wait(&self, seconds: f64) {
        let current = self.current();
        let deadline = self.deadline_after(seconds);

        if let Some(task) = &current {
            task.set_run_state(RunState::Wait);
            trace!(task_id = %task.id(), seconds, "task waiting");
        }
        while self.inner.clock.now() < deadline {
            self.next(Value::Null).await;
        }
        if let Some(task) = &current {
            task.set_run_state(RunState::Run);
        }
    }

    fn deadline_after(&self, seconds: f64) -> DateTime<Utc> {
        let now = self.inner.clock.now();
        if !seconds.is_finite() || seconds <= 0.0 {
            return now;
        }
        Duration::try_from_secs_f64(seconds)
            .ok()
            .and_then(|wait| TimeDelta::from_std(wait).ok())
            .and_then(|wait| now.checked_add_signed(wait))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    // ---- registries ----

    pub fn register_error(&self, id: TaskId, fault: TaskExecutionFault) -> &Self {
        self.inner.errors.borrow_mut().register(id, fault);
        self
    }

    /// Record the task's result; an id may hold only one result.
    pub(crate) fn add_result_from(&self, task: &Task) -> Result<&Self, LoopError> {
        let result = TaskResult::new(task.id(), task.get_return(), task.elapsed());
        let mut results = self.inner.results.borrow_mut();
        if results.contains(&result.id) {
            warn!(task_id = %result.id, "result already recorded for this id");
            return Err(LoopError::DuplicateTaskId(result.id));
        }
        results.push(result);
        Ok(self)
    }

    pub(crate) fn report_state(&self, task: &Task) {
        if self.inner.debug.get() {
            let report = TaskReport::new(task.id(), task.execution_state(), self.inner.clock.now());
            self.inner.reports.borrow_mut().push(report);
        }
    }

    // ---- run ----

    /// Drive every queued task until the queue is empty.
    ///
    /// `late` is merged into each task's own parameters on its first start.
    /// Tasks deferred during the run are picked up from the next pass on.
    ///
    /// # Errors
    /// - `MaxTries` when a task reaches its limit without abort-on-limit
    /// - `Task` when a task body returns an error
    /// - whatever a task's error strategy returns for an intercepted panic
    ///
    /// Registries and the remaining queue are left as they were at the
    /// moment of the error.
    pub fn run(&self, late: Params) -> Result<(), LoopError> {
        if self.inner.running.replace(true) {
            return Err(LoopError::AlreadyRunning);
        }
        let _run = RunGuard { inner: &self.inner };
        self.ensure_unique_ids()?;

        let _interceptor = self.inner.interceptor.register();
        self.inner.counter.borrow_mut().start();
        info!(
            tasks = self.count_tasks(),
            intercepting = self.is_intercepting(),
            debug = self.is_debug(),
            "loop started"
        );

        let outcome = self.drive(&late);

        self.inner.counter.borrow_mut().stop();
        match &outcome {
            Ok(()) => info!(
                results = self.inner.results.borrow().len(),
                errors = self.inner.errors.borrow().len(),
                total = %self.total_time(),
                "loop finished"
            ),
            Err(err) => warn!(error = %err, remaining = self.count_tasks(), "loop ended abnormally"),
        }
        outcome
    }

    fn drive(&self, late: &Params) -> Result<(), LoopError> {
        let mut pass: u64 = 0;
        while !self.inner.tasks.borrow().is_empty() {
            pass += 1;
            let keys: Vec<SlotKey> = self.inner.tasks.borrow().snapshot();
            debug!(pass, tasks = keys.len(), "pass started");

            for key in keys {
                let Some(task) = self.inner.tasks.borrow().get(key).cloned() else {
                    continue;
                };
                self.ensure_fresh_id(&task)?;
                self.turn(&task, late)?;
                self.report_state(&task);
            }
        }
        Ok(())
    }

    fn turn(&self, task: &Task, late: &Params) -> Result<Value, LoopError> {
        *self.inner.current.borrow_mut() = Some(task.clone());
        let outcome = task.run(self, late);
        self.inner.current.borrow_mut().take();
        trace!(
            task_id = %task.id(),
            state = %task.execution_state(),
            turn = task.turn(),
            "turn done"
        );
        outcome
    }

    fn ensure_unique_ids(&self) -> Result<(), LoopError> {
        let tasks = self.inner.tasks.borrow();
        let results = self.inner.results.borrow();
        let mut seen = HashSet::new();
        for task in tasks.iter() {
            let id = task.id();
            if results.contains(&id) || !seen.insert(id.clone()) {
                return Err(LoopError::DuplicateTaskId(id));
            }
        }
        Ok(())
    }

    /// Tasks deferred or renamed during the run are checked before their
    /// first turn.
    fn ensure_fresh_id(&self, task: &Task) -> Result<(), LoopError> {
        if task.execution_state() != ExecutionState::Initial {
            return Ok(());
        }
        let id = task.id();
        let taken = self.inner.results.borrow().contains(&id)
            || self
                .inner
                .tasks
                .borrow()
                .iter()
                .any(|other| !other.is_same(task) && other.id() == id);
        if taken {
            warn!(task_id = %id, "task id already in use");
            return Err(LoopError::DuplicateTaskId(id));
        }
        Ok(())
    }

    // ---- queries ----

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            running: self.is_running(),
            active: self.count_tasks(),
            completed: self.inner.results.borrow().len(),
            errors: self.inner.errors.borrow().len(),
            reports: self.inner.reports.borrow().len(),
        }
    }

    /// Return values of completed tasks, in completion order.
    pub fn returns(&self) -> IndexMap<TaskId, Value> {
        self.inner.results.borrow().returns()
    }

    pub fn return_of(&self, id: impl Into<TaskId>) -> Option<Value> {
        let id = id.into();
        self.inner
            .results
            .borrow()
            .find(&id)
            .map(|result| result.return_value.clone())
    }

    /// Elapsed time of a completed task, formatted with the task precision.
    pub fn elapsed_time_of(&self, id: impl Into<TaskId>) -> Option<String> {
        let precision = self.inner.config.task_precision;
        self.elapsed_watch_of(id.into())
            .map(|watch| watch.elapsed_time(precision))
    }

    pub fn elapsed_of(&self, id: impl Into<TaskId>) -> Option<Duration> {
        self.elapsed_watch_of(id.into()).map(|watch| watch.elapsed())
    }

    fn elapsed_watch_of(&self, id: TaskId) -> Option<Stopwatch> {
        self.inner
            .results
            .borrow()
            .find(&id)
            .map(|result| result.elapsed.clone())
    }

    pub fn elapsed_times(&self) -> IndexMap<TaskId, String> {
        let precision = self.inner.config.task_precision;
        self.inner.results.borrow().elapsed_times(precision)
    }

    /// Elapsed time of the whole run, formatted with the total precision.
    pub fn total_time(&self) -> String {
        let precision = self.inner.config.total_precision;
        self.inner.counter.borrow().elapsed_time(precision)
    }

    pub fn total_elapsed(&self) -> Duration {
        self.inner.counter.borrow().elapsed()
    }

    pub fn reports(&self) -> Vec<TaskReport> {
        self.inner.reports.borrow().all()
    }

    pub fn reports_with_state(&self, state: ExecutionState) -> Vec<TaskReport> {
        self.inner.reports.borrow().filter(state)
    }

    /// Reports whose state has the given (case-insensitive) name.
    pub fn reports_named(&self, name: &str) -> Result<Vec<TaskReport>, LoopError> {
        let state: ExecutionState = name.parse()?;
        Ok(self.reports_with_state(state))
    }

    pub fn reports_of(&self, id: impl Into<TaskId>) -> Vec<TaskReport> {
        self.inner.reports.borrow().of(&id.into())
    }

    pub fn errors(&self) -> IndexMap<TaskId, TaskExecutionFault> {
        self.inner.errors.borrow().errors()
    }

    pub fn error_ids(&self) -> Vec<TaskId> {
        self.inner.errors.borrow().ids()
    }

    pub fn error_for(&self, id: impl Into<TaskId>) -> Option<TaskExecutionFault> {
        self.inner.errors.borrow().error_for(&id.into()).cloned()
    }
}
