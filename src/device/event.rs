use crate::error::EventError;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Marker trait for event tag types.
/// Implemented for everything `Clone + PartialEq + Send + 'static`.
pub trait Tag: Clone + PartialEq + Send + 'static {}

impl<T: Clone + PartialEq + Send + 'static> Tag for T {}

/// Process-wide tag registry, one insertion-ordered set per tag type.
/// Initialized empty on first use; grows monotonically; never cleared.
static REGISTRY: OnceLock<Mutex<HashMap<TypeId, Box<dyn Any + Send>>>> = OnceLock::new();

fn with_tags<T: Tag, R>(f: impl FnOnce(&mut Vec<T>) -> R) -> R {
    let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock();
    let slot = map
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(Vec::<T>::new()));

    // The slot keyed by TypeId::of::<T>() only ever holds a Vec<T>.
    let tags = slot.downcast_mut::<Vec<T>>().expect("registry slot type");
    f(tags)
}

/// Tagged, raise-able signal drawn from a registered tag set.
///
/// Construction requires the tag to be registered for its type beforehand;
/// a fresh event is raised.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T: Tag> {
    tag: T,
    raised: bool,
}

impl<T: Tag> Event<T> {
    /// Register `tag` for this type. Idempotent; duplicates are rejected
    /// while insertion order of first registrations is preserved.
    pub fn register(tag: T) {
        with_tags(|tags: &mut Vec<T>| {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        });
    }

    /// Register several tags in iteration order.
    pub fn register_all<I: IntoIterator<Item = T>>(tags: I) {
        for tag in tags {
            Self::register(tag);
        }
    }

    /// Snapshot of the registered tags, in first-registration order.
    pub fn registered() -> Vec<T> {
        with_tags(|tags| tags.clone())
    }

    /// Whether `tag` has been registered for this type.
    pub fn is_registered(tag: &T) -> bool {
        with_tags(|tags| tags.contains(tag))
    }

    /// Create a raised event carrying `tag`.
    ///
    /// Fails with [`EventError::UnregisteredTag`] if the tag is unknown.
    pub fn new(tag: T) -> Result<Self, EventError> {
        if !Self::is_registered(&tag) {
            return Err(EventError::UnregisteredTag);
        }

        Ok(Self { tag, raised: true })
    }

    /// The event's tag.
    pub fn tag(&self) -> &T {
        &self.tag
    }

    /// Whether the event is pending processing.
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    /// Mark the event as pending.
    pub fn raise(&mut self) {
        self.raised = true;
    }

    /// Mark the event as processed.
    pub fn lower(&mut self) {
        self.raised = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses a private tag type so registry state never leaks
    // between tests.

    #[test]
    fn construction_requires_registration() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Lamp {
            Lit,
            Dark,
        }

        assert_eq!(Event::new(Lamp::Lit), Err(EventError::UnregisteredTag));

        Event::register(Lamp::Lit);
        assert!(Event::is_registered(&Lamp::Lit));
        assert!(!Event::is_registered(&Lamp::Dark));

        let event = Event::new(Lamp::Lit).unwrap();
        assert_eq!(*event.tag(), Lamp::Lit);
        assert!(event.is_raised());
    }

    #[test]
    fn registration_is_idempotent_and_ordered() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Door {
            Open,
            Closed,
            Jammed,
        }

        Event::register_all([Door::Open, Door::Closed, Door::Open, Door::Jammed]);
        assert_eq!(
            Event::<Door>::registered(),
            vec![Door::Open, Door::Closed, Door::Jammed]
        );
    }

    #[test]
    fn raise_and_lower_toggle_the_flag() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        struct Ping;

        Event::register(Ping);
        let mut event = Event::new(Ping).unwrap();

        event.lower();
        assert!(!event.is_raised());

        event.raise();
        assert!(event.is_raised());
    }

    #[test]
    fn registries_are_separate_per_type() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        struct Left;
        #[derive(Debug, Clone, Copy, PartialEq)]
        struct Right;

        Event::register(Left);
        assert!(Event::is_registered(&Left));
        assert!(!Event::is_registered(&Right));
    }
}
