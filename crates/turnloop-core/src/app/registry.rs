//! Append-only registries filled while the loop runs.

use indexmap::IndexMap;
use serde_json::Value;

use crate::domain::{
    ErrorRecord, ExecutionState, TaskExecutionFault, TaskId, TaskReport, TaskResult,
};

/// Results of terminated tasks, in completion order.
#[derive(Debug, Default)]
pub struct ResultRegistry {
    results: Vec<TaskResult>,
}

impl ResultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: TaskResult) {
        self.results.push(result);
    }

    pub fn find(&self, id: &TaskId) -> Option<&TaskResult> {
        self.results.iter().find(|result| &result.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.find(id).is_some()
    }

    /// Return values keyed by task id.
    pub fn returns(&self) -> IndexMap<TaskId, Value> {
        self.results
            .iter()
            .map(|result| (result.id.clone(), result.return_value.clone()))
            .collect()
    }

    /// Formatted elapsed time keyed by task id.
    pub fn elapsed_times(&self, precision: usize) -> IndexMap<TaskId, String> {
        self.results
            .iter()
            .map(|result| (result.id.clone(), result.elapsed.elapsed_time(precision)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Faults registered by strategies instead of being propagated.
#[derive(Debug, Default)]
pub struct ErrorRegistry {
    records: Vec<ErrorRecord>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: TaskId, fault: TaskExecutionFault) {
        self.records.push(ErrorRecord { id, fault });
    }

    pub fn errors(&self) -> IndexMap<TaskId, TaskExecutionFault> {
        self.records
            .iter()
            .map(|record| (record.id.clone(), record.fault.clone()))
            .collect()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.records.iter().map(|record| record.id.clone()).collect()
    }

    pub fn error_for(&self, id: &TaskId) -> Option<&TaskExecutionFault> {
        self.records
            .iter()
            .find(|record| &record.id == id)
            .map(|record| &record.fault)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Debug-mode state snapshots.
#[derive(Debug, Default)]
pub struct ReportRegistry {
    reports: Vec<TaskReport>,
}

impl ReportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: TaskReport) {
        self.reports.push(report);
    }

    pub fn all(&self) -> Vec<TaskReport> {
        self.reports.clone()
    }

    pub fn filter(&self, state: ExecutionState) -> Vec<TaskReport> {
        self.reports
            .iter()
            .filter(|report| report.state == state)
            .cloned()
            .collect()
    }

    pub fn of(&self, id: &TaskId) -> Vec<TaskReport> {
        self.reports
            .iter()
            .filter(|report| &report.id == id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
