//! Task error interceptor.
//!
//! Runtime-level faults are panics. While a loop run with interception is
//! in progress, a panic hook records the location of panics raised inside a
//! task turn, and `catch_unwind` around the turn turns them into a
//! [`TaskExecutionFault`]. Panics raised anywhere else go to the hook that
//! was installed before.
//!
//! The hook is process-wide, so installs are reference counted: the first
//! registration installs it, the last restoration puts the previous hook
//! back.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::{Arc, Mutex};

use crate::domain::{PANIC_CODE, TaskExecutionFault};

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

struct HookState {
    installed: usize,
    previous: Option<Arc<PanicHook>>,
    /// Our hook is the process hook (it may outlive `installed` reaching 0
    /// when the restore happened on a panicking thread).
    active: bool,
}

static HOOK: Mutex<HookState> = Mutex::new(HookState {
    installed: 0,
    previous: None,
    active: false,
});

thread_local! {
    static IN_TURN: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<(String, u32)>> = const { RefCell::new(None) };
}

/// Per-loop switch for interception.
///
/// Turning it on only takes effect at the next `register`, i.e. the next
/// `TurnLoop::run`.
#[derive(Debug, Default)]
pub struct TaskErrorInterceptor {
    on: Cell<bool>,
    registered: Cell<bool>,
}

impl TaskErrorInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self) -> &Self {
        self.on.set(true);
        self
    }

    pub fn off(&self) -> &Self {
        self.on.set(false);
        self
    }

    pub fn is_on(&self) -> bool {
        self.on.get()
    }

    /// Is the hook installed on behalf of this interceptor right now?
    pub fn is_registered(&self) -> bool {
        self.registered.get()
    }

    /// Install the hook if interception is on and not already registered.
    ///
    /// Dropping the guard restores the previous hook.
    pub fn register(&self) -> Option<InterceptorGuard<'_>> {
        if !self.on.get() || self.registered.get() {
            return None;
        }
        install_hook();
        self.registered.set(true);
        Some(InterceptorGuard { owner: self })
    }
}

/// Keeps the hook installed; restores the previous one when dropped.
#[must_use = "the hook is restored as soon as the guard is dropped"]
pub struct InterceptorGuard<'a> {
    owner: &'a TaskErrorInterceptor,
}

impl Drop for InterceptorGuard<'_> {
    fn drop(&mut self) {
        self.owner.registered.set(false);
        restore_hook();
    }
}

/// Is the interception hook the process-wide panic hook right now?
pub fn hook_installed() -> bool {
    HOOK.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .active
}

fn install_hook() {
    let mut state = HOOK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if !state.active {
        let previous: Arc<PanicHook> = Arc::from(panic::take_hook());
        let forward = Arc::clone(&previous);
        panic::set_hook(Box::new(move |info| {
            if IN_TURN.get() {
                if let Some(location) = info.location() {
                    let captured = (location.file().to_string(), location.line());
                    CAPTURED.with_borrow_mut(|slot| *slot = Some(captured));
                }
            } else {
                forward(info);
            }
        }));
        state.previous = Some(previous);
        state.active = true;
    }
    state.installed += 1;
}

fn restore_hook() {
    let mut state = HOOK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    state.installed = state.installed.saturating_sub(1);
    if state.installed > 0 {
        return;
    }
    // set_hook panics on a panicking thread; ours forwards outside turns,
    // so it stays active until the next restore.
    if std::thread::panicking() {
        return;
    }
    if let Some(previous) = state.previous.take() {
        panic::set_hook(Box::new(move |info| previous(info)));
    }
    state.active = false;
}

/// Run one turn, converting a panic into a [`TaskExecutionFault`].
pub(crate) fn intercept<R>(turn: impl FnOnce() -> R) -> Result<R, TaskExecutionFault> {
    let was_in_turn = IN_TURN.replace(true);
    CAPTURED.with_borrow_mut(|slot| slot.take());
    let outcome = panic::catch_unwind(AssertUnwindSafe(turn));
    IN_TURN.set(was_in_turn);

    outcome.map_err(|payload| {
        let message = payload_message(payload.as_ref());
        match CAPTURED.with_borrow_mut(|slot| slot.take()) {
            Some((file, line)) => TaskExecutionFault::new(PANIC_CODE, message, file, line),
            None => TaskExecutionFault::unlocated(message),
        }
    })
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "task panicked".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_requires_opt_in() {
        let interceptor = TaskErrorInterceptor::new();
        assert!(interceptor.register().is_none());
        assert!(!interceptor.is_registered());
    }

    #[test]
    fn register_is_not_reentrant() {
        let interceptor = TaskErrorInterceptor::new();
        interceptor.on();

        let guard = interceptor.register();
        assert!(guard.is_some());
        assert!(interceptor.is_registered());
        assert!(interceptor.register().is_none());

        drop(guard);
        assert!(!interceptor.is_registered());
    }

    #[test]
    fn off_disables_later_registration() {
        let interceptor = TaskErrorInterceptor::new();
        interceptor.on().off();
        assert!(!interceptor.is_on());
        assert!(interceptor.register().is_none());
    }

    #[test]
    fn panics_become_located_faults() {
        let interceptor = TaskErrorInterceptor::new();
        interceptor.on();
        let _guard = interceptor.register();

        let inputs = vec!["test1", "test2", "test3"];
        let index = inputs.len() + 1;
        let fault = intercept(|| inputs[index]).unwrap_err();

        assert_eq!(fault.code, PANIC_CODE);
        assert!(fault.message.contains("index out of bounds"));
        assert!(fault.line > 0 || fault.file == "<unknown>");
    }

    #[test]
    fn normal_turns_pass_through() {
        assert_eq!(intercept(|| 40 + 2).unwrap(), 42);
    }

    #[test]
    fn formatted_payloads_keep_their_message() {
        let fault = intercept(|| panic!("failed on {}", "purpose")).unwrap_err();
        assert_eq!(fault.message, "failed on purpose");
    }
}
