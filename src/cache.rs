// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::permission::Permission;
use crate::principal::Principal;
use crate::resource::Resource;

/// Process-wide cache of effective permission masks keyed by
/// `(user, resource)`.
///
/// Staleness is never tolerated: every ACL entry, role assignment or
/// membership mutation must invalidate synchronously before the mutating call
/// returns. Because inherited entries flow downward and group entries fan out
/// to an unknown member set, an invalidation that cannot be pinned to exact
/// `(user, resource)` keys flushes the whole map rather than guessing.
///
/// Inserts are generation-guarded: a reader records [`generation`] at its
/// lookup miss and a later [`put_if_current`] is dropped if any invalidation
/// ran in between. Without the guard a slow evaluation could install a mask
/// computed before a concurrent mutation, reintroducing the staleness the
/// invalidation just removed.
///
/// [`generation`]: EffectiveCache::generation
/// [`put_if_current`]: EffectiveCache::put_if_current
#[derive(Debug, Default)]
pub struct EffectiveCache {
    inner: RwLock<HashMap<(u64, Resource), Permission>>,
    epoch: AtomicU64,
}

impl EffectiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: u64, resource: Resource) -> Option<Permission> {
        let inner = self.inner.read().ok()?;
        inner.get(&(user_id, resource)).copied()
    }

    /// The current invalidation generation. Record it before computing a
    /// value destined for [`put_if_current`](EffectiveCache::put_if_current).
    pub fn generation(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Insert a resolution computed at `generation`, unless an invalidation
    /// has run since. The check happens under the write lock, so it cannot
    /// race with the invalidators.
    pub fn put_if_current(
        &self,
        user_id: u64,
        resource: Resource,
        effective: Permission,
        generation: u64,
    ) {
        if let Ok(mut inner) = self.inner.write() {
            if self.epoch.load(Ordering::Acquire) == generation {
                inner.insert((user_id, resource), effective);
            }
        }
    }

    /// Invalidate after a mutation of an entry or assignment for `principal`
    /// at `resource`.
    ///
    /// A non-inheriting user entry touches exactly one key per cached
    /// resource; anything broader (group principal, or an entry descendants
    /// can inherit) flushes everything.
    pub fn invalidate_entry(&self, resource: Resource, principal: Principal, inherits: bool) {
        match principal {
            Principal::User(user_id) if !inherits => {
                if let Ok(mut inner) = self.inner.write() {
                    self.epoch.fetch_add(1, Ordering::AcqRel);
                    inner.remove(&(user_id, resource));
                }
                debug!(user_id, %resource, "cache invalidated for single key");
            }
            _ => self.invalidate_all(),
        }
    }

    /// Invalidate every cached resolution for one user, called when the
    /// user's group memberships change.
    pub fn invalidate_user(&self, user_id: u64) {
        if let Ok(mut inner) = self.inner.write() {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            inner.retain(|(cached_user, _), _| *cached_user != user_id);
        }
        debug!(user_id, "cache invalidated for user");
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut inner) = self.inner.write() {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            inner.clear();
        }
        debug!("cache flushed");
    }
}

#[cfg(test)]
mod tests {
    use super::EffectiveCache;
    use crate::permission::Permission;
    use crate::principal::Principal;
    use crate::resource::Resource;

    fn put(cache: &EffectiveCache, user_id: u64, resource: Resource, effective: Permission) {
        cache.put_if_current(user_id, resource, effective, cache.generation());
    }

    #[test]
    fn single_key_invalidation() {
        let cache = EffectiveCache::new();
        put(&cache, 1, Resource::workspace(1), Permission::contributor());
        put(&cache, 2, Resource::workspace(1), Permission::editor());

        cache.invalidate_entry(Resource::workspace(1), Principal::User(1), false);
        assert!(cache.get(1, Resource::workspace(1)).is_none());
        assert_eq!(
            cache.get(2, Resource::workspace(1)),
            Some(Permission::editor())
        );
    }

    #[test]
    fn inheriting_entry_flushes_everything() {
        let cache = EffectiveCache::new();
        put(&cache, 1, Resource::project(10), Permission::contributor());
        put(&cache, 2, Resource::workspace(1), Permission::editor());

        cache.invalidate_entry(Resource::workspace(1), Principal::User(1), true);
        assert!(cache.get(1, Resource::project(10)).is_none());
        assert!(cache.get(2, Resource::workspace(1)).is_none());
    }

    #[test]
    fn membership_change_invalidates_user() {
        let cache = EffectiveCache::new();
        put(&cache, 1, Resource::workspace(1), Permission::contributor());
        put(&cache, 1, Resource::project(10), Permission::contributor());
        put(&cache, 2, Resource::workspace(1), Permission::editor());

        cache.invalidate_user(1);
        assert!(cache.get(1, Resource::workspace(1)).is_none());
        assert!(cache.get(1, Resource::project(10)).is_none());
        assert_eq!(
            cache.get(2, Resource::workspace(1)),
            Some(Permission::editor())
        );
    }

    #[test]
    fn insert_from_before_an_invalidation_is_dropped() {
        let cache = EffectiveCache::new();
        let generation = cache.generation();

        // An invalidation lands between the lookup miss and the insert.
        cache.invalidate_all();
        cache.put_if_current(
            1,
            Resource::workspace(1),
            Permission::contributor(),
            generation,
        );
        assert!(cache.get(1, Resource::workspace(1)).is_none());

        // The same insert at the current generation sticks.
        put(&cache, 1, Resource::workspace(1), Permission::contributor());
        assert_eq!(
            cache.get(1, Resource::workspace(1)),
            Some(Permission::contributor())
        );
    }
}
