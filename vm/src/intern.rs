//! The selector-intern table.
//!
//! Maps canonical selector names to their hash pair and the heap
//! ByteArray holding the name bytes. Single-writer during VM init, then
//! append-only under the lock; entries are never removed, and the name
//! objects are roots.

use std::collections::HashMap;

use object::{SelectorHash, Value};
use parking_lot::RwLock;

#[derive(Clone, Copy)]
pub struct InternedSelector {
    pub hash: SelectorHash,
    /// Heap ByteArray holding the canonical name bytes.
    pub name: Value,
}

pub struct InternTable {
    inner: RwLock<HashMap<String, InternedSelector>>,
}

impl InternTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_entries(entries: HashMap<String, InternedSelector>) -> Self {
        Self {
            inner: RwLock::new(entries),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<InternedSelector> {
        self.inner.read().get(name).copied()
    }

    /// Append an entry. Re-interning an existing name keeps the first
    /// entry (the name object identity must stay stable).
    pub fn insert(&self, name: &str, entry: InternedSelector) -> InternedSelector {
        let mut table = self.inner.write();
        *table.entry(name.to_string()).or_insert(entry)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Visit the interned name objects as collection roots.
    pub fn visit(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for entry in self.inner.get_mut().values_mut() {
            visitor(&mut entry.name);
        }
    }
}

impl Default for InternTable {
    fn default() -> Self {
        Self::new()
    }
}
