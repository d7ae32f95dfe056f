// Waiting Queue - bounded FIFO with O(1) position lookup

use super::error::QueueError;
use super::request::RequestId;
use crate::error::{AppError, Result};
use indexmap::map::Entry;
use indexmap::IndexMap;

/// Bounded FIFO of waiting entries keyed by request ID.
///
/// Insertion order is arrival order and is never rearranged: removal from the
/// middle shifts later entries forward, so `position_of` stays an O(1) index
/// lookup.
#[derive(Debug)]
pub struct WaitingQueue<T> {
    entries: IndexMap<RequestId, T>,
}

impl<T> Default for WaitingQueue<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T> WaitingQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append to the tail. Fails with `QueueFull` when `len() >= capacity`
    /// and with `Validation` when `id` is already queued; neither mutates.
    pub fn enqueue(&mut self, id: RequestId, entry: T, capacity: usize) -> Result<()> {
        if self.entries.len() >= capacity {
            return Err(QueueError::QueueFull {
                max_queue_size: capacity,
            }
            .into());
        }
        match self.entries.entry(id) {
            Entry::Occupied(slot) => Err(AppError::Validation(format!(
                "request {} is already queued",
                slot.key()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// Head of the queue without removing it
    pub fn peek(&self) -> Option<(&RequestId, &T)> {
        self.entries.first()
    }

    /// Pop the head
    pub fn dequeue_next(&mut self) -> Option<(RequestId, T)> {
        self.entries.shift_remove_index(0)
    }

    /// Remove a specific entry, keeping the order of the rest
    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.entries.shift_remove(id)
    }

    /// 1-based rank, or `None` if not queued
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.entries.get_index_of(id).map(|index| index + 1)
    }

    /// Remove every entry matching `predicate`, preserving the order of the
    /// survivors. Returns the removed entries in queue order.
    pub fn drain_where<F>(&mut self, mut predicate: F) -> Vec<(RequestId, T)>
    where
        F: FnMut(&T) -> bool,
    {
        let doomed: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(id, _)| id.clone())
            .collect();

        doomed
            .into_iter()
            .filter_map(|id| self.entries.shift_remove(&id).map(|entry| (id, entry)))
            .collect()
    }

    /// Empty the queue, returning all entries in queue order
    pub fn drain_all(&mut self) -> Vec<(RequestId, T)> {
        self.entries.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(ids: &[&str]) -> WaitingQueue<u32> {
        let mut queue = WaitingQueue::new();
        for (i, id) in ids.iter().enumerate() {
            queue.enqueue(id.to_string(), i as u32, 10).unwrap();
        }
        queue
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.dequeue_next().map(|(id, _)| id), Some("a".to_string()));
        assert_eq!(queue.dequeue_next().map(|(id, _)| id), Some("b".to_string()));
        assert_eq!(queue.dequeue_next().map(|(id, _)| id), Some("c".to_string()));
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_enqueue_over_capacity_mutates_nothing() {
        let mut queue = WaitingQueue::new();
        queue.enqueue("a".to_string(), 1, 1).unwrap();

        let err = queue.enqueue("b".to_string(), 2, 1).unwrap_err();
        assert!(matches!(
            err,
            AppError::Queue(QueueError::QueueFull { max_queue_size: 1 })
        ));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.position_of("b"), None);
    }

    #[test]
    fn test_enqueue_duplicate_id_keeps_first_entry() {
        let mut queue = queue_of(&["a", "b"]);

        let err = queue.enqueue("a".to_string(), 99, 10).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position_of("a"), Some(1));
        assert_eq!(queue.dequeue_next(), Some(("a".to_string(), 0)));
    }

    #[test]
    fn test_position_after_middle_removal() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        assert_eq!(queue.position_of("c"), Some(3));

        assert_eq!(queue.remove("b"), Some(1));
        assert_eq!(queue.position_of("a"), Some(1));
        assert_eq!(queue.position_of("c"), Some(2));
        assert_eq!(queue.position_of("d"), Some(3));
        assert_eq!(queue.position_of("b"), None);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut queue = queue_of(&["a"]);
        assert_eq!(queue.remove("zzz"), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_where_keeps_survivor_order() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);
        let removed = queue.drain_where(|value| value % 2 == 1);

        let removed_ids: Vec<_> = removed.into_iter().map(|(id, _)| id).collect();
        assert_eq!(removed_ids, vec!["b".to_string(), "d".to_string()]);
        assert_eq!(queue.position_of("a"), Some(1));
        assert_eq!(queue.position_of("c"), Some(2));
        assert_eq!(queue.position_of("e"), Some(3));
    }

    #[test]
    fn test_drain_all() {
        let mut queue = queue_of(&["a", "b"]);
        assert_eq!(queue.drain_all().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
    }
}
