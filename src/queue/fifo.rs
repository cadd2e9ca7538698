use crossbeam::queue::SegQueue;
use std::sync::Arc;

/// Thread-safe unbounded FIFO carrying elements of a single type.
///
/// Backed by a lock-free segmented queue. Elements enqueued by one producer
/// come out in FIFO order; ordering across producers is unspecified. `len`
/// is an approximate count under contention — [`try_dequeue`](Self::try_dequeue)
/// is authoritative for emptiness.
///
/// Queues are shared by reference-counted ownership; consumers hold weak
/// [`QueueReader`](crate::queue::QueueReader) handles instead of clones.
pub struct Queue<T> {
    inner: SegQueue<T>,
}

impl<T> Queue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Create an empty queue wrapped in [`Arc`].
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Append an element. Never blocks.
    #[inline]
    pub fn enqueue(&self, element: T) {
        self.inner.push(element);
    }

    /// Pop the oldest element, or `None` if the queue is empty.
    #[inline]
    pub fn try_dequeue(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Approximate number of queued elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue currently looks empty. Racy under contention.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
