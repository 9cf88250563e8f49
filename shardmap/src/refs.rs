use std::ops::Deref;

use parking_lot::MappedRwLockReadGuard;

/// A value borrowed out of a read-locked shard.
pub struct Ref<'a, V> {
    guard: MappedRwLockReadGuard<'a, V>,
}

impl<'a, V> Ref<'a, V> {
    pub(crate) fn new(guard: MappedRwLockReadGuard<'a, V>) -> Self {
        Self { guard }
    }

    pub fn value(&self) -> &V {
        &self.guard
    }
}

impl<V> Deref for Ref<'_, V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}
