//! Active queue.
//!
//! Tasks are keyed by a monotonically increasing [`SlotKey`] and kept in
//! insertion order. A pass never iterates the map itself: it walks a
//! snapshot of the keys taken when the pass began and skips keys that are
//! gone. This gives the visiting rules the loop relies on:
//! - a task removed during a pass is not visited again in that pass;
//! - a task appended during a pass is first visited in the next pass;
//! - removing any task leaves the order of the others untouched.

use indexmap::IndexMap;

use super::task::Task;

/// Stable identity of a queue slot. Never reused within one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey(u64);

#[derive(Debug, Default)]
pub(crate) struct ActiveQueue {
    tasks: IndexMap<SlotKey, Task>,
    next_key: u64,
}

impl ActiveQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserve the key of the next task to be pushed.
    pub(crate) fn allocate_key(&mut self) -> SlotKey {
        let key = SlotKey(self.next_key);
        self.next_key += 1;
        key
    }

    pub(crate) fn push(&mut self, task: Task) {
        self.tasks.insert(task.key(), task);
    }

    /// Remove one task, keeping the others in order.
    pub(crate) fn remove(&mut self, key: SlotKey) -> Option<Task> {
        self.tasks.shift_remove(&key)
    }

    /// Remove every task, in queue order.
    pub(crate) fn drain(&mut self) -> Vec<Task> {
        self.tasks.drain(..).map(|(_, task)| task).collect()
    }

    pub(crate) fn get(&self, key: SlotKey) -> Option<&Task> {
        self.tasks.get(&key)
    }

    pub(crate) fn contains(&self, key: SlotKey) -> bool {
        self.tasks.contains_key(&key)
    }

    /// Keys of all tasks, in visiting order.
    pub(crate) fn snapshot(&self) -> Vec<SlotKey> {
        self.tasks.keys().copied().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// First task matching `pred`.
    pub(crate) fn find(&self, mut pred: impl FnMut(&Task) -> bool) -> Option<&Task> {
        self.tasks.values().find(|task| pred(task))
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::computation::Computation;
    use crate::app::config::LoopConfig;
    use serde_json::Value;

    fn task(queue: &mut ActiveQueue, name: &str) -> Task {
        let key = queue.allocate_key();
        let computation = Computation::new(|_| async { Ok(Value::Null) });
        let task = Task::new(key, computation, Default::default(), &LoopConfig::default())
            .identified_by(name);
        queue.push(task.clone());
        task
    }

    fn ids(queue: &ActiveQueue) -> Vec<String> {
        queue.iter().map(|t| t.id().to_string()).collect()
    }

    #[test]
    fn keys_are_never_reused() {
        let mut queue = ActiveQueue::new();
        let a = task(&mut queue, "a");
        queue.remove(a.key());
        let b = task(&mut queue, "b");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn removal_keeps_the_order_of_the_rest() {
        let mut queue = ActiveQueue::new();
        task(&mut queue, "a");
        let b = task(&mut queue, "b");
        task(&mut queue, "c");

        assert!(queue.remove(b.key()).is_some());

        assert_eq!(ids(&queue), vec!["a", "c"]);
        assert!(!queue.contains(b.key()));
        assert!(queue.remove(b.key()).is_none());
    }

    #[test]
    fn snapshot_walk_tolerates_mutation() {
        let mut queue = ActiveQueue::new();
        let a = task(&mut queue, "a");
        let b = task(&mut queue, "b");
        task(&mut queue, "c");

        let mut visited = Vec::new();
        for key in queue.snapshot() {
            let Some(current) = queue.get(key).cloned() else {
                continue;
            };
            visited.push(current.id().to_string());
            if current.key() == a.key() {
                // visiting a removes itself and b, then appends d
                queue.remove(a.key());
                queue.remove(b.key());
                task(&mut queue, "d");
            }
        }

        assert_eq!(visited, vec!["a", "c"]);
        assert_eq!(ids(&queue), vec!["c", "d"]);
    }

    #[test]
    fn drain_empties_in_order() {
        let mut queue = ActiveQueue::new();
        task(&mut queue, "a");
        task(&mut queue, "b");

        let drained: Vec<String> = queue.drain().iter().map(|t| t.id().to_string()).collect();

        assert_eq!(drained, vec!["a", "b"]);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn find_matches_by_predicate() {
        let mut queue = ActiveQueue::new();
        task(&mut queue, "a");
        task(&mut queue, "b");

        let found = queue.find(|t| t.id() == "b").map(|t| t.id().to_string());
        assert_eq!(found.as_deref(), Some("b"));
        assert!(queue.find(|t| t.id() == "z").is_none());
    }
}
