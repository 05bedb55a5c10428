/// Indexed storage with slot reuse.
///
/// A `Slab` hands out small `usize` keys on [`insert`](Self::insert) and
/// recycles them after [`remove`](Self::remove). It backs the waiter
/// registry of [`SharedFuture`](crate::task::SharedFuture), where each
/// handle owns at most one key and removes it when it goes away.
///
/// # Examples
///
/// ```rust,ignore
/// let mut slab = Slab::new();
/// let key = slab.insert("waiter");
/// assert_eq!(slab.remove(key), Some("waiter"));
/// ```
pub(crate) struct Slab<T> {
    /// Occupied slots hold `Some`.
    entries: Vec<Option<T>>,

    /// Keys of vacant slots, most recently freed last.
    free: Vec<usize>,
}

impl<T> Slab<T> {
    /// Creates an empty slab.
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Stores `value` and returns its key.
    pub(crate) fn insert(&mut self, value: T) -> usize {
        match self.free.pop() {
            Some(key) => {
                self.entries[key] = Some(value);
                key
            }
            None => {
                self.entries.push(Some(value));
                self.entries.len() - 1
            }
        }
    }

    /// Removes the value stored under `key`.
    ///
    /// Returns `None` if the slot is vacant or out of range.
    pub(crate) fn remove(&mut self, key: usize) -> Option<T> {
        let value = self.entries.get_mut(key)?.take()?;

        self.free.push(key);

        Some(value)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub(crate) fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        self.entries.get_mut(key)?.as_mut()
    }

    /// Removes every value, yielding them in key order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.free.clear();

        self.entries.drain(..).flatten()
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}
