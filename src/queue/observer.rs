use crate::error::{PollFault, SpawnError};
use crate::observer::{Observable, Observer};
use crate::queue::{QueuePoller, QueueReader};
use std::sync::Arc;

/// Binds a [`QueuePoller`] to an [`Observable`]: every message drained from
/// the reader is fanned out to the attached observers.
pub struct QueueObserver<T> {
    // Field order matters: the poller joins on drop before the fan-out
    // handle is released, so no update fires into a torn-down registry.
    poller: QueuePoller<T>,
    observable: Arc<Observable<T>>,
}

impl<T: Send + 'static> QueueObserver<T> {
    /// Spawn an observer pump over `reader` with an initial observer set.
    pub fn new<I>(reader: QueueReader<T>, observers: I) -> Result<Self, SpawnError>
    where
        I: IntoIterator<Item = Arc<dyn Observer<T>>>,
    {
        let observable = Observable::new_arc();
        observable.attach_all(observers);

        let fanout = observable.clone();
        let poller = QueuePoller::new(reader, move |message| fanout.notify(&message))?;

        Ok(Self {
            poller,
            observable,
        })
    }

    /// Attach an observer to the fan-out.
    pub fn attach(&self, observer: &Arc<dyn Observer<T>>) {
        self.observable.attach(observer);
    }

    /// Detach an observer from the fan-out.
    pub fn detach(&self, observer: &Arc<dyn Observer<T>>) {
        self.observable.detach(observer);
    }

    /// Whether the embedded poller is still draining.
    pub fn polling(&self) -> bool {
        self.poller.polling()
    }

    /// Fault captured by the embedded poller, if any.
    pub fn error(&self) -> Option<PollFault> {
        self.poller.error()
    }
}
