//! Status - ステータスクエリ

use serde::{Deserialize, Serialize};

/// Counts describing a loop at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStatus {
    pub running: bool,
    pub active: usize,
    pub completed: usize,
    pub errors: usize,
    pub reports: usize,
}
