//! Snapshot Module
//!
//! Point-in-time copy of the cached values, iterated without holding the cache lock.

use std::slice;
use std::vec;

/// Values present in the cache at the moment [`TtlCache::snapshot`](crate::cache::TtlCache::snapshot)
/// was called. Iterating it any number of times never touches the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<V> {
    values: Vec<V>,
}

impl<V> Snapshot<V> {
    pub(crate) fn new(values: Vec<V>) -> Self {
        Self { values }
    }

    pub fn iter(&self) -> slice::Iter<'_, V> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<V> {
        self.values
    }
}

impl<V> IntoIterator for Snapshot<V> {
    type Item = V;
    type IntoIter = vec::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a Snapshot<V> {
    type Item = &'a V;
    type IntoIter = slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
