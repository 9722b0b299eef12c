// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::entry::{AccessType, AclEntry, EntryKey, unix_now};
use crate::permission::Permission;
use crate::principal::Principal;
use crate::resource::Resource;
use crate::role::{Role, RoleAssignment, RoleTarget};
use crate::traits::{AclStore, RoleStore};

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("memory store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<EntryKey, AclEntry>,
    ids: HashMap<u64, EntryKey>,
    assignments: HashMap<(u64, RoleTarget), RoleAssignment>,
    next_id: u64,
}

/// In-memory ACL and role-assignment store.
///
/// One `RwLock` over the maps serializes all writers, which satisfies the
/// per-key serialization requirement while keeping reads shared. The logical
/// entry identity is the map key, so duplicate grants collapse into upserts
/// by construction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl AclStore for MemoryStore {
    type Error = MemoryStoreError;

    fn entries_at(&self, resource: &Resource) -> Result<Vec<AclEntry>, Self::Error> {
        let inner = self.inner.read().map_err(|_| MemoryStoreError::Poisoned)?;
        let mut entries: Vec<_> = inner
            .entries
            .values()
            .filter(|entry| entry.resource == *resource)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    fn entries_for(
        &self,
        resources: &[Resource],
        principals: &[Principal],
    ) -> Result<Vec<AclEntry>, Self::Error> {
        let inner = self.inner.read().map_err(|_| MemoryStoreError::Poisoned)?;
        let mut entries = Vec::new();
        for resource in resources {
            for principal in principals {
                for access_type in [AccessType::Allow, AccessType::Deny] {
                    let key = EntryKey {
                        resource: *resource,
                        principal: *principal,
                        access_type,
                    };
                    if let Some(entry) = inner.entries.get(&key) {
                        entries.push(entry.clone());
                    }
                }
            }
        }
        Ok(entries)
    }

    fn get(&self, id: u64) -> Result<Option<AclEntry>, Self::Error> {
        let inner = self.inner.read().map_err(|_| MemoryStoreError::Poisoned)?;
        let entry = inner
            .ids
            .get(&id)
            .and_then(|key| inner.entries.get(key))
            .cloned();
        Ok(entry)
    }

    fn upsert(
        &self,
        resource: Resource,
        principal: Principal,
        permissions: Permission,
        access_type: AccessType,
        inherit_to_children: bool,
    ) -> Result<AclEntry, Self::Error> {
        let mut inner = self.inner.write().map_err(|_| MemoryStoreError::Poisoned)?;
        let key = EntryKey {
            resource,
            principal,
            access_type,
        };

        let entry = match inner.entries.get(&key).cloned() {
            Some(mut updated) => {
                updated.permissions = permissions;
                updated.inherit_to_children = inherit_to_children;
                updated
            }
            None => {
                let id = inner.next_id();
                inner.ids.insert(id, key);
                AclEntry {
                    id,
                    resource,
                    principal,
                    permissions,
                    access_type,
                    inherit_to_children,
                    created_at: unix_now(),
                }
            }
        };

        inner.entries.insert(key, entry.clone());
        Ok(entry)
    }

    fn update(
        &self,
        id: u64,
        permissions: Permission,
        inherit_to_children: bool,
    ) -> Result<Option<AclEntry>, Self::Error> {
        let mut inner = self.inner.write().map_err(|_| MemoryStoreError::Poisoned)?;
        let Some(key) = inner.ids.get(&id).copied() else {
            return Ok(None);
        };
        let Some(entry) = inner.entries.get_mut(&key) else {
            return Ok(None);
        };
        entry.permissions = permissions;
        entry.inherit_to_children = inherit_to_children;
        Ok(Some(entry.clone()))
    }

    fn delete(&self, id: u64) -> Result<bool, Self::Error> {
        let mut inner = self.inner.write().map_err(|_| MemoryStoreError::Poisoned)?;
        let Some(key) = inner.ids.remove(&id) else {
            return Ok(false);
        };
        Ok(inner.entries.remove(&key).is_some())
    }

    fn delete_for_principal(
        &self,
        resource: &Resource,
        principal: &Principal,
    ) -> Result<usize, Self::Error> {
        let mut inner = self.inner.write().map_err(|_| MemoryStoreError::Poisoned)?;
        let mut removed = 0;
        for access_type in [AccessType::Allow, AccessType::Deny] {
            let key = EntryKey {
                resource: *resource,
                principal: *principal,
                access_type,
            };
            if let Some(entry) = inner.entries.remove(&key) {
                inner.ids.remove(&entry.id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn all_entries(&self) -> Result<Vec<AclEntry>, Self::Error> {
        let inner = self.inner.read().map_err(|_| MemoryStoreError::Poisoned)?;
        let mut entries: Vec<_> = inner.entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }
}

impl RoleStore for MemoryStore {
    type Error = MemoryStoreError;

    fn assignments_for(&self, group_ids: &[u64]) -> Result<Vec<RoleAssignment>, Self::Error> {
        let inner = self.inner.read().map_err(|_| MemoryStoreError::Poisoned)?;
        let mut assignments: Vec<_> = inner
            .assignments
            .values()
            .filter(|assignment| group_ids.contains(&assignment.group_id))
            .cloned()
            .collect();
        assignments.sort_by_key(|assignment| assignment.id);
        Ok(assignments)
    }

    fn upsert_assignment(
        &self,
        group_id: u64,
        target: RoleTarget,
        role: Role,
        inherit_to_children: bool,
    ) -> Result<RoleAssignment, Self::Error> {
        let mut inner = self.inner.write().map_err(|_| MemoryStoreError::Poisoned)?;
        let assignment = match inner.assignments.get(&(group_id, target)).cloned() {
            Some(mut updated) => {
                updated.role = role;
                updated.inherit_to_children = inherit_to_children;
                updated
            }
            None => {
                let id = inner.next_id();
                RoleAssignment {
                    id,
                    group_id,
                    target,
                    role,
                    inherit_to_children,
                    created_at: unix_now(),
                }
            }
        };
        inner
            .assignments
            .insert((group_id, target), assignment.clone());
        Ok(assignment)
    }

    fn remove_assignment(&self, group_id: u64, target: RoleTarget) -> Result<bool, Self::Error> {
        let mut inner = self.inner.write().map_err(|_| MemoryStoreError::Poisoned)?;
        Ok(inner.assignments.remove(&(group_id, target)).is_some())
    }

    fn all_assignments(&self) -> Result<Vec<RoleAssignment>, Self::Error> {
        let inner = self.inner.read().map_err(|_| MemoryStoreError::Poisoned)?;
        let mut assignments: Vec<_> = inner.assignments.values().cloned().collect();
        assignments.sort_by_key(|assignment| assignment.id);
        Ok(assignments)
    }
}
