//! Selector hashing.
//!
//! A selector's canonical name hashes to a 32-bit value that slot tables
//! store next to the name. Hashing is deterministic within a build;
//! collisions are tolerated because every hash hit re-checks the name
//! bytes before it counts.

/// The built-in parent selector.
pub const PARENT_NAME: &str = "parent";

/// Hash a selector's canonical name bytes.
#[inline]
pub fn hash_selector(name: &[u8]) -> u32 {
    fxhash::hash32(name)
}

/// Hash of the built-in `parent` selector.
#[inline]
pub fn parent_hash() -> u32 {
    hash_selector(PARENT_NAME.as_bytes())
}

/// The hash pair of one selector.
///
/// `regular` matches slots by name. For single-keyword selectors like
/// `foo:`, `assign_target` carries the hash of the underlying `foo` so the
/// lookup engine can find the mutable data slot an assignment writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorHash {
    pub regular: u32,
    pub assign_target: Option<u32>,
}

impl SelectorHash {
    pub fn of(name: &str) -> Self {
        let bytes = name.as_bytes();
        let regular = hash_selector(bytes);
        let assign_target = match bytes.split_last() {
            Some((b':', base)) if !base.is_empty() && !base.contains(&b':') => {
                Some(hash_selector(base))
            }
            _ => None,
        };
        Self {
            regular,
            assign_target,
        }
    }
}

/// A selector: canonical name bytes plus the precomputed hash pair.
///
/// The name travels with the hash so slot matches can re-check byte
/// equality on hash collisions.
#[derive(Debug, Clone, Copy)]
pub struct Selector<'a> {
    pub name: &'a [u8],
    pub hash: SelectorHash,
}

impl<'a> Selector<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name: name.as_bytes(),
            hash: SelectorHash::of(name),
        }
    }

    /// The name without the trailing colon — what an assignment selector's
    /// data slot is called.
    pub fn assign_target_name(&self) -> &'a [u8] {
        debug_assert!(self.hash.assign_target.is_some());
        &self.name[..self.name.len() - 1]
    }
}
