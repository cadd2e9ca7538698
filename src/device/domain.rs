use std::sync::Arc;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Immutable predicate defining the admissible values of a type.
///
/// Composition captures shared handles to the operands, so a composite
/// stays valid after the originals are dropped.
pub struct Domain<T> {
    predicate: Predicate<T>,
}

impl<T> Domain<T> {
    pub fn new(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Whether `element` belongs to the domain.
    #[inline]
    pub fn contains(&self, element: &T) -> bool {
        (self.predicate)(element)
    }

    /// Union: admits what either operand admits. Short-circuits.
    pub fn or(&self, other: &Domain<T>) -> Domain<T>
    where
        T: 'static,
    {
        let left = self.predicate.clone();
        let right = other.predicate.clone();

        Domain {
            predicate: Arc::new(move |element| left(element) || right(element)),
        }
    }

    /// Intersection: admits what both operands admit. Short-circuits.
    pub fn and(&self, other: &Domain<T>) -> Domain<T>
    where
        T: 'static,
    {
        let left = self.predicate.clone();
        let right = other.predicate.clone();

        Domain {
            predicate: Arc::new(move |element| left(element) && right(element)),
        }
    }
}

impl<T> Clone for Domain<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
        }
    }
}
