//! Suspendable computation.
//!
//! A task body is an `async` block driven by hand: every start or resume is
//! exactly one poll with a no-op waker. The body gives control back with
//! [`suspend`], which stays pending for one poll and hands a value to the
//! driver.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use serde_json::Value;
use thiserror::Error;

use crate::domain::Params;

/// Error type task bodies may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a task body produces once it terminates.
pub type TaskOutput = Result<Value, BoxError>;

type LocalFuture = Pin<Box<dyn Future<Output = TaskOutput>>>;
type Body = Box<dyn FnOnce(Params) -> LocalFuture>;

thread_local! {
    static YIELDED: RefCell<Option<Value>> = const { RefCell::new(None) };
}

#[derive(Debug, Error)]
pub enum ComputationError {
    #[error("computation already started")]
    AlreadyStarted,

    #[error("computation not started")]
    NotStarted,

    #[error("computation already terminated")]
    Terminated,

    #[error(transparent)]
    Failed(BoxError),
}

enum Status {
    Idle(Body),
    Suspended(LocalFuture),
    Terminated,
}

/// One task body and its progress.
pub struct Computation {
    status: Status,
    output: Option<Value>,
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("started", &self.is_started())
            .field("terminated", &self.is_terminated())
            .field("output", &self.output)
            .finish()
    }
}

impl Computation {
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Params) -> Fut + 'static,
        Fut: Future<Output = TaskOutput> + 'static,
    {
        let body: Body = Box::new(move |args| Box::pin(body(args)));
        Self {
            status: Status::Idle(body),
            output: None,
        }
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.status, Status::Idle(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.status, Status::Terminated)
    }

    /// Final return value; `None` until the body returned `Ok`.
    pub fn get_return(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Run the body with `args` up to its first suspension.
    ///
    /// Returns the suspended value, or the return value if the body finished
    /// without suspending.
    pub fn start(&mut self, args: Params) -> Result<Value, ComputationError> {
        match std::mem::replace(&mut self.status, Status::Terminated) {
            Status::Idle(body) => {
                self.status = Status::Suspended(body(args));
                self.poll()
            }
            other => {
                self.status = other;
                Err(ComputationError::AlreadyStarted)
            }
        }
    }

    /// Continue the body from its last suspension.
    pub fn resume(&mut self) -> Result<Value, ComputationError> {
        match self.status {
            Status::Idle(_) => Err(ComputationError::NotStarted),
            Status::Terminated => Err(ComputationError::Terminated),
            Status::Suspended(_) => self.poll(),
        }
    }

    fn poll(&mut self) -> Result<Value, ComputationError> {
        let Status::Suspended(future) = &mut self.status else {
            return Err(ComputationError::NotStarted);
        };

        YIELDED.with_borrow_mut(|slot| slot.take());
        let mut cx = Context::from_waker(Waker::noop());
        let polled = future.as_mut().poll(&mut cx);
        match polled {
            Poll::Pending => Ok(YIELDED
                .with_borrow_mut(|slot| slot.take())
                .unwrap_or(Value::Null)),
            Poll::Ready(output) => {
                self.status = Status::Terminated;
                let value = output.map_err(ComputationError::Failed)?;
                self.output = Some(value.clone());
                Ok(value)
            }
        }
    }
}

/// Future returned by [`suspend`].
#[derive(Debug)]
#[must_use = "suspension only happens when the future is awaited"]
pub struct Suspend {
    value: Option<Value>,
}

impl Future for Suspend {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.value.take() {
            Some(value) => {
                YIELDED.with_borrow_mut(|slot| *slot = Some(value));
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

/// Give control back to whoever drives the computation.
///
/// `value` is returned by the `start`/`resume` call that is in progress;
/// the body continues right after the `.await` on the next resume.
pub fn suspend(value: Value) -> Suspend {
    Suspend { value: Some(value) }
}
