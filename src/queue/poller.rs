use crate::error::{PollFault, SpawnError};
use crate::queue::QueueReader;
use crate::utils::ActiveFlag;
use crossbeam::utils::Backoff;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Background worker that drains a [`QueueReader`] into a handler callback.
///
/// One thread is spawned at construction and runs until [`stop`](Self::stop)
/// is called, the poller is dropped, or a fault occurs. A handler panic or
/// the death of the watched queue is captured as a [`PollFault`] and ends
/// polling; the snapshot stays readable through [`error`](Self::error).
///
/// Dropping the poller joins the worker. Never drop it from inside its own
/// handler.
pub struct QueuePoller<T> {
    polling: ActiveFlag,
    fault: Arc<Mutex<Option<PollFault>>>,
    join: Option<thread::JoinHandle<()>>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + 'static> QueuePoller<T> {
    /// Spawn a poller over `reader`, invoking `handler` for every message.
    ///
    /// Fails with [`SpawnError::ExpiredReader`] if the reader is already
    /// dead, or [`SpawnError::Launch`] if the worker thread cannot start.
    pub fn new<F>(reader: QueueReader<T>, mut handler: F) -> Result<Self, SpawnError>
    where
        F: FnMut(T) + Send + 'static,
    {
        if reader.expired() {
            return Err(SpawnError::ExpiredReader);
        }

        let polling = ActiveFlag::new(true);
        let fault: Arc<Mutex<Option<PollFault>>> = Arc::new(Mutex::new(None));

        let worker_flag = polling.clone();
        let worker_fault = fault.clone();

        let join = thread::Builder::new()
            .name("flux-poller".to_string())
            .spawn(move || {
                let backoff = Backoff::new();
                let mut spins: u32 = 0;

                while worker_flag.get_acquire() {
                    match reader.try_dequeue() {
                        Ok(Some(message)) => {
                            spins = 0;
                            backoff.reset();

                            let outcome =
                                panic::catch_unwind(AssertUnwindSafe(|| handler(message)));

                            if let Err(cause) = outcome {
                                let captured = PollFault::from_panic(cause);
                                tracing::error!("[QueuePoller] {captured}");
                                *worker_fault.lock() = Some(captured);
                                worker_flag.set_release(false);
                            }
                        }
                        Ok(None) => {
                            spins = spins.saturating_add(1);
                            if spins < 64 {
                                backoff.spin();
                            } else if spins < 256 {
                                backoff.snooze();
                            } else {
                                thread::sleep(Duration::from_micros(2));
                            }
                        }
                        Err(_) => {
                            tracing::warn!("[QueuePoller] watched queue expired");
                            *worker_fault.lock() = Some(PollFault::Expired);
                            worker_flag.set_release(false);
                        }
                    }
                }
            })
            .map_err(SpawnError::Launch)?;

        Ok(Self {
            polling,
            fault,
            join: Some(join),
            _marker: PhantomData,
        })
    }
}

impl<T> QueuePoller<T> {
    /// Whether the worker is still draining the reader.
    pub fn polling(&self) -> bool {
        self.polling.get_acquire()
    }

    /// Snapshot of the captured fault, if any.
    pub fn error(&self) -> Option<PollFault> {
        self.fault.lock().clone()
    }

    /// Ask the worker to exit. Does not join; dropping the poller does.
    pub fn stop(&self) {
        self.polling.set_release(false);
    }
}

impl<T> Drop for QueuePoller<T> {
    fn drop(&mut self) {
        self.polling.set_release(false);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
