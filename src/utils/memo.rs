//! Compute-once slots for lazily resolved state

use parking_lot::RwLock;

/// A memoized optional value.
///
/// Reads and writes go through a read-write lock, so a value stored by one
/// thread is visible to every other thread as soon as `set` returns.
pub struct Memo<T> {
    slot: RwLock<Option<T>>,
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Current value, if filled
    pub fn get(&self) -> Option<T> {
        self.slot.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.slot.write() = Some(value);
    }

    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().is_some()
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_memo_lifecycle() {
        let memo: Memo<String> = Memo::new();
        assert!(!memo.is_set());
        assert_eq!(memo.get(), None);

        memo.set("value".to_string());
        assert!(memo.is_set());
        assert_eq!(memo.get(), Some("value".to_string()));

        memo.clear();
        assert_eq!(memo.get(), None);
    }

    #[test]
    fn test_memo_visible_across_threads() {
        let memo = Arc::new(Memo::new());

        let writer = {
            let memo = Arc::clone(&memo);
            thread::spawn(move || memo.set(42u32))
        };
        writer.join().unwrap();

        assert_eq!(memo.get(), Some(42));
    }
}
