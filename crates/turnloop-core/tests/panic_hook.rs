//! Kept alone in its binary: it replaces the process-wide panic hook.

use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use turnloop_core::app::hook_installed;
use turnloop_core::{Params, TurnLoop};

static FORWARDED: AtomicUsize = AtomicUsize::new(0);

#[test]
fn previous_hook_is_restored_after_an_intercepted_run() {
    panic::set_hook(Box::new(|_| {
        FORWARDED.fetch_add(1, Ordering::SeqCst);
    }));

    let lp = TurnLoop::new();
    lp.handle_errors();
    lp.defer(
        |_| async {
            let bytes: Vec<u8> = Vec::new();
            let index = bytes.len();
            Ok(json!(bytes[index]))
        },
        Params::new(),
    )
    .identified_by("faulty")
    .cancel_on_error();

    lp.run(Params::new()).unwrap();

    assert_eq!(FORWARDED.load(Ordering::SeqCst), 0);
    let fault = lp.error_for("faulty").unwrap();
    assert!(fault.line > 0);

    let outside = panic::catch_unwind(|| panic!("outside of any turn"));
    assert!(outside.is_err());
    assert_eq!(FORWARDED.load(Ordering::SeqCst), 1);
    assert!(!hook_installed());

    drop(panic::take_hook());
}
