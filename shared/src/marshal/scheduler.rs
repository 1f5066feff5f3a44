use std::{cmp::Ordering, collections::BinaryHeap};

use crate::chunk::ChunkPriority;

use super::context::PrepareDataResult;

/// A chunk that has something to marshal this pass
#[derive(Clone, Debug)]
pub struct MarshalTask<K> {
    pub key: K,
    pub priority: ChunkPriority,
    pub prepared: PrepareDataResult,
}

struct QueuedTask<K> {
    task: MarshalTask<K>,
    sequence: u64,
}

impl<K> PartialEq for QueuedTask<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K> Eq for QueuedTask<K> {}

impl<K> PartialOrd for QueuedTask<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for QueuedTask<K> {
    // higher priority first, then earlier submission
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Orders a marshal pass by chunk priority. `K` identifies the chunk to the
/// caller, typically a (replica, chunk index) pair.
pub struct MarshalScheduler<K> {
    queue: BinaryHeap<QueuedTask<K>>,
    next_sequence: u64,
}

impl<K> MarshalScheduler<K> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Queues a chunk for marshalling. Chunks with nothing due are skipped;
    /// returns whether the task was queued.
    pub fn schedule(&mut self, key: K, priority: ChunkPriority, prepared: PrepareDataResult) -> bool {
        if prepared.is_empty() {
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(QueuedTask {
            task: MarshalTask {
                key,
                priority,
                prepared,
            },
            sequence,
        });
        true
    }

    pub fn pop(&mut self) -> Option<MarshalTask<K>> {
        self.queue.pop().map(|queued| queued.task)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<K> Default for MarshalScheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Iterator for MarshalScheduler<K> {
    type Item = MarshalTask<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}
