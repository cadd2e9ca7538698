use crate::error::ReaderError;
use crate::queue::Queue;
use std::sync::{Arc, Weak};

/// Weak, revocable handle to a [`Queue`] owned elsewhere.
///
/// A reader never keeps its queue alive. Once the owning [`Arc`] is dropped
/// (or the reader was never bound), every accessor fails with
/// [`ReaderError::Expired`]. Cloning a reader yields another weak handle to
/// the same queue.
///
/// Multiple readers may observe one queue; they do not coordinate, so any
/// reader may win a dequeue race.
pub struct QueueReader<T> {
    queue: Weak<Queue<T>>,
}

impl<T> QueueReader<T> {
    /// Create an unbound reader.
    pub fn new() -> Self {
        Self { queue: Weak::new() }
    }

    /// Create a reader bound to `queue`.
    pub fn from_queue(queue: &Arc<Queue<T>>) -> Self {
        Self {
            queue: Arc::downgrade(queue),
        }
    }

    /// Bind to `queue`, replacing any current binding.
    pub fn connect(&mut self, queue: &Arc<Queue<T>>) {
        self.queue = Arc::downgrade(queue);
    }

    /// Drop the binding. Afterwards [`expired`](Self::expired) is true.
    pub fn disconnect(&mut self) {
        self.queue = Weak::new();
    }

    /// True iff the handle cannot be upgraded to a live queue.
    #[inline]
    pub fn expired(&self) -> bool {
        self.queue.strong_count() == 0
    }

    fn upgrade(&self) -> Result<Arc<Queue<T>>, ReaderError> {
        self.queue.upgrade().ok_or(ReaderError::Expired)
    }

    /// Pop the oldest element, or `Ok(None)` if the queue is empty.
    #[inline]
    pub fn try_dequeue(&self) -> Result<Option<T>, ReaderError> {
        Ok(self.upgrade()?.try_dequeue())
    }

    /// Approximate number of queued elements.
    pub fn len(&self) -> Result<usize, ReaderError> {
        Ok(self.upgrade()?.len())
    }

    /// Whether the queue currently looks empty.
    pub fn is_empty(&self) -> Result<bool, ReaderError> {
        Ok(self.upgrade()?.is_empty())
    }
}

impl<T> Clone for QueueReader<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T> Default for QueueReader<T> {
    fn default() -> Self {
        Self::new()
    }
}
