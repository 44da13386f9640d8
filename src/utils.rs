//! Various utilities.

use std::{
    fmt::{self, Debug, Formatter},
    io,
    path::Path,
    sync::RwLock,
};

/// A single-assignment option slot shared between tasks.
///
/// The slot starts empty and is written at most a handful of times over the life of the process
/// (in practice exactly once); reads are frequent. Writers and readers never hold the lock across
/// a suspension point, so a plain `RwLock` is sufficient.
pub struct SingleSlot<T> {
    inner: RwLock<Option<T>>,
}

impl<T: Clone> SingleSlot<T> {
    /// Creates an empty slot.
    pub fn empty() -> Self {
        SingleSlot {
            inner: RwLock::new(None),
        }
    }

    /// Returns a clone of the slot's value, if populated.
    pub fn get(&self) -> Option<T> {
        self.inner
            .read()
            .expect("single slot lock poisoned")
            .clone()
    }

    /// Stores a value in the slot, replacing any previous value.
    pub fn set(&self, value: T) {
        *self.inner.write().expect("single slot lock poisoned") = Some(value);
    }

    /// Whether the slot holds a value.
    pub fn is_populated(&self) -> bool {
        self.inner
            .read()
            .expect("single slot lock poisoned")
            .is_some()
    }
}

impl<T: Clone> Default for SingleSlot<T> {
    fn default() -> Self {
        SingleSlot::empty()
    }
}

impl<T> Debug for SingleSlot<T> {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        let populated = self
            .inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        formatter
            .debug_struct("SingleSlot")
            .field("populated", &populated)
            .finish()
    }
}

/// Reads a file into a string, wrapping the path into the error.
pub(crate) fn read_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|error| {
        io::Error::new(
            error.kind(),
            format!("could not read {}: {}", path.display(), error),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_starts_empty() {
        let slot = SingleSlot::<u32>::empty();
        assert!(!slot.is_populated());
        assert_eq!(None, slot.get());
    }

    #[test]
    fn slot_returns_stored_value() {
        let slot = SingleSlot::empty();
        slot.set(42u32);
        assert!(slot.is_populated());
        assert_eq!(Some(42), slot.get());
    }

    #[test]
    fn slot_overwrite_keeps_latest() {
        // Concurrent equivalent writes are permitted; the latest one wins.
        let slot = SingleSlot::empty();
        slot.set(1u32);
        slot.set(2u32);
        assert_eq!(Some(2), slot.get());
    }
}
