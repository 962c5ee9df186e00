use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::overlay::{Layer, Overlay};

/// Shared handle to a single primitive. The lock is held for the whole read-compute-use sequence
/// when drawing or hit-testing it, so mutating it through this handle is always safe. Changes
/// become visible after the owning overlay is asked to redraw.
pub type PrimitiveRef<T> = Arc<Mutex<T>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Insertion-ordered, index-addressable collection of primitives which can be mutated while an
/// overlay thread is drawing them. Indices are not stable across removals.
pub struct Primitives<T> {
    elements: Mutex<Vec<PrimitiveRef<T>>>,
}

impl<T> Default for Primitives<T> {
    fn default() -> Self {
        Self {
            elements: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Primitives<T> {
    pub fn push(&self, primitive: T) -> PrimitiveRef<T> {
        let primitive = Arc::new(Mutex::new(primitive));
        lock(&self.elements).push(Arc::clone(&primitive));
        primitive
    }

    pub fn extend(&self, primitives: impl IntoIterator<Item = T>) {
        lock(&self.elements).extend(
            primitives
                .into_iter()
                .map(|primitive| Arc::new(Mutex::new(primitive))),
        );
    }

    /// Remove the primitive at `index`, shifting all after it.
    pub fn remove(&self, index: usize) -> Option<PrimitiveRef<T>> {
        let mut elements = lock(&self.elements);
        (index < elements.len()).then(|| elements.remove(index))
    }

    pub fn clear(&self) {
        lock(&self.elements).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.elements).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Primitive at `index`, or `None` if the collection shrank in the meantime.
    pub fn get(&self, index: usize) -> Option<PrimitiveRef<T>> {
        lock(&self.elements).get(index).cloned()
    }

    /// Consistent copy of the collection, so that a draw pass can iterate it without holding
    /// the lock.
    pub fn snapshot(&self) -> Vec<PrimitiveRef<T>> {
        lock(&self.elements).clone()
    }
}

/// Value computed for a particular zoom level, like a position projected to world pixels.
#[derive(Debug, Clone)]
pub(crate) struct ZoomCache<T> {
    entry: Option<(u8, T)>,
}

impl<T> Default for ZoomCache<T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<T> ZoomCache<T> {
    /// Forget the value. Must be called whenever the geometry it was computed from changes.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Value for `zoom`, computed only if the cached one belongs to a different zoom level.
    /// Failed computation leaves the cache empty.
    pub fn get_or_compute(&mut self, zoom: u8, compute: impl FnOnce() -> Option<T>) -> Option<&T> {
        if self
            .entry
            .as_ref()
            .is_none_or(|(cached_zoom, _)| *cached_zoom != zoom)
        {
            self.entry = compute().map(|value| (zoom, value));
        }
        self.entry.as_ref().map(|(_, value)| value)
    }
}

/// Layer which draws a collection of primitives.
pub trait HasPrimitives {
    type Primitive;

    fn primitives(&self) -> &Primitives<Self::Primitive>;
}

/// Every mutation requests a redraw, so that it shows up on the map.
impl<L: Layer + HasPrimitives> Overlay<L> {
    pub fn add(&self, primitive: L::Primitive) -> PrimitiveRef<L::Primitive> {
        let primitive = self.layer().primitives().push(primitive);
        self.populate();
        primitive
    }

    pub fn add_all(&self, primitives: impl IntoIterator<Item = L::Primitive>) {
        self.layer().primitives().extend(primitives);
        self.populate();
    }

    pub fn remove(&self, index: usize) -> Option<PrimitiveRef<L::Primitive>> {
        let removed = self.layer().primitives().remove(index);
        self.populate();
        removed
    }

    pub fn clear(&self) {
        self.layer().primitives().clear();
        self.populate();
    }

    pub fn get(&self, index: usize) -> Option<PrimitiveRef<L::Primitive>> {
        self.layer().primitives().get(index)
    }

    pub fn len(&self) -> usize {
        self.layer().primitives().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layer().primitives().is_empty()
    }
}
