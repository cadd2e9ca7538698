use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Endpoint receiving notifications of type `T`.
pub trait Observer<T>: Send + Sync {
    fn update(&self, message: &T);
}

/// Ordered fan-out registry of weak observer handles.
///
/// The registry never keeps an observer alive: entries are weak, and a
/// dropped observer is invisible to [`notify`](Self::notify). Delivery
/// preserves attach order among live observers.
pub struct Observable<T> {
    observers: Mutex<Vec<Weak<dyn Observer<T>>>>,
}

impl<T> Observable<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Create an empty registry wrapped in [`Arc`].
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Append an observer. Duplicates are allowed and each copy is notified.
    pub fn attach(&self, observer: &Arc<dyn Observer<T>>) {
        self.observers.lock().push(Arc::downgrade(observer));
    }

    /// Append several observers in iteration order.
    pub fn attach_all<I>(&self, observers: I)
    where
        I: IntoIterator<Item = Arc<dyn Observer<T>>>,
    {
        let mut guard = self.observers.lock();
        for observer in observers {
            guard.push(Arc::downgrade(&observer));
        }
    }

    /// Remove every entry resolving to `observer`; dead entries are pruned
    /// on the way through.
    pub fn detach(&self, observer: &Arc<dyn Observer<T>>) {
        self.observers.lock().retain(|weak| match weak.upgrade() {
            Some(live) => !Arc::ptr_eq(&live, observer),
            None => false,
        });
    }

    /// Deliver `message` to every live observer, in attach order.
    ///
    /// The list is snapshotted under the lock and delivery happens outside
    /// it, so a handler may reenter `attach`/`detach` without deadlock. The
    /// reentrant call affects future notifications, not this one.
    pub fn notify(&self, message: &T) {
        let snapshot: Vec<Weak<dyn Observer<T>>> = self.observers.lock().clone();

        for weak in snapshot {
            if let Some(observer) = weak.upgrade() {
                observer.update(message);
            }
        }
    }

}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    struct Recorder {
        id: u32,
        log: Arc<PlMutex<Vec<u32>>>,
    }

    impl Observer<u32> for Recorder {
        fn update(&self, message: &u32) {
            self.log.lock().push(self.id * 1000 + message);
        }
    }

    fn recorder(id: u32, log: &Arc<PlMutex<Vec<u32>>>) -> Arc<dyn Observer<u32>> {
        Arc::new(Recorder {
            id,
            log: log.clone(),
        })
    }

    #[test]
    fn notify_preserves_attach_order() {
        let log = Arc::new(PlMutex::new(Vec::new()));
        let observable = Observable::new();
        let first = recorder(1, &log);
        let second = recorder(2, &log);

        observable.attach(&first);
        observable.attach(&second);
        observable.notify(&7);

        assert_eq!(*log.lock(), vec![1007, 2007]);
    }

    #[test]
    fn detached_observer_receives_nothing() {
        let log = Arc::new(PlMutex::new(Vec::new()));
        let observable = Observable::new();
        let first = recorder(1, &log);
        let second = recorder(2, &log);

        observable.attach(&first);
        observable.attach(&second);
        observable.detach(&first);
        observable.notify(&1);

        assert_eq!(*log.lock(), vec![2001]);
    }

    #[test]
    fn dropped_observer_is_skipped() {
        let log = Arc::new(PlMutex::new(Vec::new()));
        let observable = Observable::new();
        let kept = recorder(1, &log);
        let dropped = recorder(2, &log);

        observable.attach(&dropped);
        observable.attach(&kept);
        drop(dropped);
        observable.notify(&5);

        assert_eq!(*log.lock(), vec![1005]);
    }

    #[test]
    fn reentrant_detach_does_not_deadlock() {
        struct SelfDetacher {
            observable: Arc<Observable<u32>>,
            me: PlMutex<Option<Arc<dyn Observer<u32>>>>,
            hits: PlMutex<u32>,
        }

        impl Observer<u32> for SelfDetacher {
            fn update(&self, _message: &u32) {
                *self.hits.lock() += 1;
                if let Some(me) = self.me.lock().take() {
                    self.observable.detach(&me);
                }
            }
        }

        let observable = Observable::new_arc();
        let detacher = Arc::new(SelfDetacher {
            observable: observable.clone(),
            me: PlMutex::new(None),
            hits: PlMutex::new(0),
        });
        let as_observer: Arc<dyn Observer<u32>> = detacher.clone();
        *detacher.me.lock() = Some(as_observer.clone());

        observable.attach(&as_observer);
        observable.notify(&1);
        observable.notify(&2);

        assert_eq!(*detacher.hits.lock(), 1);
    }
}
