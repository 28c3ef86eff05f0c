//! Per-resource-type reader/writer locks.
//!
//! Operations that change a catalog's membership (create, delete, register,
//! unregister) take the type's lock exclusively; reads take it shared.
//! Child types share their parent's lock, so a subnet change excludes VPC
//! changes.
//!
//! No operation holds more than one type lock at a time.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use spider_core::ResourceType;

/// Observed state of one type lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    /// Nobody holds the lock.
    Free,
    /// Held by one or more readers.
    Shared,
    /// Held by a writer.
    Exclusive,
}

/// One entry of a lock snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    /// Lock owner type.
    pub resource_type: ResourceType,
    /// Current state.
    pub state: LockState,
}

/// The set of type locks shared by every connection.
pub struct LockRegistry {
    locks: [RwLock<()>; ResourceType::TOP_LEVEL.len()],
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LockRegistry {
    /// Create a registry with one free lock per top-level type.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: std::array::from_fn(|_| RwLock::new(())),
        }
    }

    fn slot(resource_type: ResourceType) -> usize {
        let owner = resource_type.lock_owner();
        ResourceType::TOP_LEVEL
            .iter()
            .position(|t| *t == owner)
            .unwrap_or_default()
    }

    /// Take the lock for `resource_type` shared.
    pub fn read(&self, resource_type: ResourceType) -> RwLockReadGuard<'_, ()> {
        self.locks[Self::slot(resource_type)].read()
    }

    /// Take the lock for `resource_type` exclusively.
    pub fn write(&self, resource_type: ResourceType) -> RwLockWriteGuard<'_, ()> {
        self.locks[Self::slot(resource_type)].write()
    }

    /// Report the state of every lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LockStatus> {
        ResourceType::TOP_LEVEL
            .iter()
            .zip(&self.locks)
            .map(|(t, lock)| LockStatus {
                resource_type: *t,
                state: if lock.is_locked_exclusive() {
                    LockState::Exclusive
                } else if lock.is_locked() {
                    LockState::Shared
                } else {
                    LockState::Free
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_of(registry: &LockRegistry, t: ResourceType) -> LockState {
        registry
            .snapshot()
            .into_iter()
            .find(|s| s.resource_type == t)
            .unwrap()
            .state
    }

    #[test]
    fn child_types_use_parent_lock() {
        let registry = LockRegistry::new();
        let _guard = registry.write(ResourceType::Subnet);
        assert_eq!(state_of(&registry, ResourceType::Vpc), LockState::Exclusive);
        assert_eq!(state_of(&registry, ResourceType::Vm), LockState::Free);
    }

    #[test]
    fn readers_share() {
        let registry = LockRegistry::new();
        let _a = registry.read(ResourceType::Disk);
        let _b = registry.read(ResourceType::Disk);
        assert_eq!(state_of(&registry, ResourceType::Disk), LockState::Shared);
    }

    #[test]
    fn snapshot_covers_every_top_level_type() {
        let registry = LockRegistry::new();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), ResourceType::TOP_LEVEL.len());
        assert!(snapshot.iter().all(|s| s.state == LockState::Free));
    }

    #[test]
    fn writer_excludes_other_threads() {
        let registry = LockRegistry::new();
        let guard = registry.write(ResourceType::KeyPair);
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(registry.locks[LockRegistry::slot(ResourceType::KeyPair)]
                    .try_read()
                    .is_none());
            });
        });
        drop(guard);
        assert!(registry.locks[LockRegistry::slot(ResourceType::KeyPair)]
            .try_read()
            .is_some());
    }
}
