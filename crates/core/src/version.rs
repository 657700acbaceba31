//! Optimistic versioning for mutable records.

/// A record with identity and a monotonically increasing version.
///
/// Every persisted write bumps the version by one. Stores use it to detect
/// writes that raced with another writer (compare-and-set on `version()`).
pub trait Versioned {
    /// Strongly-typed identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the record identifier.
    fn id(&self) -> &Self::Id;

    /// Current version of the record's state.
    fn version(&self) -> u64;
}

/// The version a write was derived from. A store rejects the write once the
/// stored record has moved past it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(u64);

impl ExpectedVersion {
    pub fn exact(version: u64) -> Self {
        Self(version)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }
}
