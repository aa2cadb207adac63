use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Accumulates items of type `T`, flushing a batch once it reaches `batch_size` or the oldest
/// queued item has waited `max_wait_time`, mirroring the consensus layer's own batch collector
/// for the tool-invocation side of the pipeline.
pub struct BatchProcessor<T> {
    batch_size: usize,
    max_wait_time: Duration,
    queue: Mutex<VecDeque<(T, Instant)>>,
}

impl<T> BatchProcessor<T> {
    pub fn new(batch_size: usize, max_wait_time: Duration) -> Self {
        Self { batch_size, max_wait_time, queue: Mutex::new(VecDeque::new()) }
    }

    pub fn push(&self, item: T) {
        self.queue.lock().push_back((item, Instant::now()));
    }

    pub fn try_flush(&self) -> Option<Vec<T>> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return None;
        }
        let oldest_age = queue.front().map(|(_, t)| t.elapsed()).unwrap_or_default();
        if queue.len() >= self.batch_size || oldest_age >= self.max_wait_time {
            Some(queue.drain(..).map(|(item, _)| item).collect())
        } else {
            None
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl<T> Default for BatchProcessor<T> {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(100))
    }
}
