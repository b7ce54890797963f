//! Loop configuration.

use serde::{Deserialize, Serialize};

use crate::domain::LimitAction;

/// Settings a `TurnLoop` starts with.
///
/// Every field has a default, so a partial TOML/JSON document is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Record a report for every task after each turn.
    pub debug: bool,

    /// Route panics raised during a turn to the task's strategy.
    pub handle_errors: bool,

    /// Turn limit given to newly deferred tasks.
    pub default_limit: u32,

    /// Limit action given to newly deferred tasks.
    pub default_limit_action: LimitAction,

    /// Decimals used when formatting per-task elapsed time.
    pub task_precision: usize,

    /// Decimals used when formatting the whole run's elapsed time.
    pub total_precision: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            debug: false,
            handle_errors: false,
            default_limit: 10,
            default_limit_action: LimitAction::Throw,
            task_precision: 3,
            total_precision: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_plain_loop() {
        let config = LoopConfig::default();
        assert!(!config.debug);
        assert!(!config.handle_errors);
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.default_limit_action, LimitAction::Throw);
        assert_eq!(config.task_precision, 3);
        assert_eq!(config.total_precision, 6);
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config: LoopConfig =
            serde_json::from_str(r#"{ "debug": true, "default_limit_action": "abort" }"#).unwrap();
        assert!(config.debug);
        assert_eq!(config.default_limit_action, LimitAction::Abort);
        assert_eq!(config.default_limit, 10);
    }
}
