//! Structured execution fault.

use serde::{Deserialize, Serialize};

/// Exit status a Rust process reports when it dies from a panic.
pub const PANIC_CODE: i32 = 101;

/// A runtime-level fault captured during one task turn.
///
/// Built by the interceptor from a panic: the payload becomes `message`,
/// the panic location becomes `file`/`line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("task execution fault (code {code}): {message} at {file}:{line}")]
pub struct TaskExecutionFault {
    pub code: i32,
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl TaskExecutionFault {
    pub fn new(code: i32, message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            code,
            message: message.into(),
            file: file.into(),
            line,
        }
    }

    /// A panic fault whose location is unknown.
    pub fn unlocated(message: impl Into<String>) -> Self {
        Self::new(PANIC_CODE, message, "<unknown>", 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_code_and_location() {
        let fault = TaskExecutionFault::new(PANIC_CODE, "index out of bounds", "src/lib.rs", 12);
        assert_eq!(
            fault.to_string(),
            "task execution fault (code 101): index out of bounds at src/lib.rs:12"
        );
    }

    #[test]
    fn unlocated_faults_use_the_panic_code() {
        let fault = TaskExecutionFault::unlocated("boom");
        assert_eq!(fault.code, PANIC_CODE);
        assert_eq!(fault.line, 0);
    }
}
