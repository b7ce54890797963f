//! Task states.
//!
//! # State transitions
//! - Initial -> Starting (first turn)
//! - Starting/Resuming -> Resuming (each later turn while the body is suspended)
//! - Starting/Resuming -> Complete (first turn after the body terminated)
//! - any active state -> Aborted (limit reached with `LimitAction::Abort`)
//! - any active state -> Rejected (limit reached with `LimitAction::Throw`)
//! - any active state -> OnError (fault routed to a cancelling strategy)
//!
//! Only `Initial`, `Starting` and `Resuming` may be observed on a task that
//! is still in the active queue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Observable lifecycle snapshot of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Initial,
    Starting,
    Resuming,
    Complete,
    Cancelled,
    Aborted,
    Rejected,
    OnError,
}

impl ExecutionState {
    pub const ALL: [ExecutionState; 8] = [
        ExecutionState::Initial,
        ExecutionState::Starting,
        ExecutionState::Resuming,
        ExecutionState::Complete,
        ExecutionState::Cancelled,
        ExecutionState::Aborted,
        ExecutionState::Rejected,
        ExecutionState::OnError,
    ];

    /// Has the task received at least one turn that ran its body?
    ///
    /// Turns are only counted once this holds.
    pub fn is_started(self) -> bool {
        matches!(
            self,
            ExecutionState::Starting | ExecutionState::Resuming | ExecutionState::Complete
        )
    }

    /// May a task in this state still be in the active queue?
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ExecutionState::Initial | ExecutionState::Starting | ExecutionState::Resuming
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ExecutionState::Initial => "INITIAL",
            ExecutionState::Starting => "STARTING",
            ExecutionState::Resuming => "RESUMING",
            ExecutionState::Complete => "COMPLETE",
            ExecutionState::Cancelled => "CANCELLED",
            ExecutionState::Aborted => "ABORTED",
            ExecutionState::Rejected => "REJECTED",
            ExecutionState::OnError => "ONERROR",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a state name does not match any `ExecutionState`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown execution state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for ExecutionState {
    type Err = UnknownState;

    /// Case-insensitive; `ON_ERROR` is accepted as well as `ONERROR`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('_', "");
        ExecutionState::ALL
            .into_iter()
            .find(|state| state.name() == wanted)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// Whether turns are being counted for a task.
///
/// `Wait` freezes the turn counter while the task blocks in `TurnLoop::wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Run,
    Wait,
}

impl RunState {
    pub fn toggled(self) -> Self {
        match self {
            RunState::Run => RunState::Wait,
            RunState::Wait => RunState::Run,
        }
    }
}

/// What a task does once its turn counter reaches its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitAction {
    /// Fail the whole run with a max-tries fault.
    #[default]
    Throw,
    /// Drop the task silently (state `Aborted`, no result).
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::initial(ExecutionState::Initial, false, true)]
    #[case::starting(ExecutionState::Starting, true, true)]
    #[case::resuming(ExecutionState::Resuming, true, true)]
    #[case::complete(ExecutionState::Complete, true, false)]
    #[case::cancelled(ExecutionState::Cancelled, false, false)]
    #[case::aborted(ExecutionState::Aborted, false, false)]
    #[case::rejected(ExecutionState::Rejected, false, false)]
    #[case::on_error(ExecutionState::OnError, false, false)]
    fn state_flags(#[case] state: ExecutionState, #[case] started: bool, #[case] active: bool) {
        assert_eq!(state.is_started(), started);
        assert_eq!(state.is_active(), active);
    }

    #[rstest]
    #[case("starting", ExecutionState::Starting)]
    #[case("COMPLETE", ExecutionState::Complete)]
    #[case("Aborted", ExecutionState::Aborted)]
    #[case("on_error", ExecutionState::OnError)]
    #[case("ONERROR", ExecutionState::OnError)]
    fn parses_names_case_insensitively(#[case] name: &str, #[case] expected: ExecutionState) {
        assert_eq!(name.parse::<ExecutionState>().unwrap(), expected);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "sleeping".parse::<ExecutionState>().unwrap_err();
        assert_eq!(err, UnknownState("sleeping".to_string()));
    }

    #[test]
    fn run_state_toggles() {
        assert_eq!(RunState::Run.toggled(), RunState::Wait);
        assert_eq!(RunState::Wait.toggled(), RunState::Run);
    }

    #[test]
    fn defaults_match_a_fresh_task() {
        assert_eq!(RunState::default(), RunState::Run);
        assert_eq!(LimitAction::default(), LimitAction::Throw);
    }
}
