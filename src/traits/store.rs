// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::entry::{AccessType, AclEntry};
use crate::permission::Permission;
use crate::principal::Principal;
use crate::resource::Resource;
use crate::role::{Role, RoleAssignment, RoleTarget};

/// Persistence interface for ACL entries.
///
/// Implementations take `&self` and carry their own interior synchronization:
/// reads may run shared, but mutations must be serialized per
/// `(resource, principal, access type)` key: row-level locking or optimistic
/// versioning, never a global lock around evaluation.
pub trait AclStore {
    type Error: Error;

    /// All entries stored directly at a resource, without any inheritance
    /// resolution.
    fn entries_at(&self, resource: &Resource) -> Result<Vec<AclEntry>, Self::Error>;

    /// All entries for any of the given principals at any of the given
    /// resources. This is the evaluator's single read.
    fn entries_for(
        &self,
        resources: &[Resource],
        principals: &[Principal],
    ) -> Result<Vec<AclEntry>, Self::Error>;

    /// Look up one entry by row id.
    fn get(&self, id: u64) -> Result<Option<AclEntry>, Self::Error>;

    /// Insert or replace the logical entry for the key, returning the stored
    /// row.
    fn upsert(
        &self,
        resource: Resource,
        principal: Principal,
        permissions: Permission,
        access_type: AccessType,
        inherit_to_children: bool,
    ) -> Result<AclEntry, Self::Error>;

    /// Update permissions and inheritance of an existing row. Returns `None`
    /// if the row does not exist.
    fn update(
        &self,
        id: u64,
        permissions: Permission,
        inherit_to_children: bool,
    ) -> Result<Option<AclEntry>, Self::Error>;

    /// Delete one row by id. Returns `false` if it was not present.
    fn delete(&self, id: u64) -> Result<bool, Self::Error>;

    /// Delete every entry (allow and deny) for a principal at exactly this
    /// resource. Returns the number of rows removed; zero is not an error.
    fn delete_for_principal(
        &self,
        resource: &Resource,
        principal: &Principal,
    ) -> Result<usize, Self::Error>;

    /// Every stored entry, for export and simulation snapshots.
    fn all_entries(&self) -> Result<Vec<AclEntry>, Self::Error>;
}

/// Persistence interface for security-group role assignments.
pub trait RoleStore {
    type Error: Error;

    /// All assignments held by any of the given groups.
    fn assignments_for(&self, group_ids: &[u64]) -> Result<Vec<RoleAssignment>, Self::Error>;

    /// Insert or replace the assignment for `(group, target)`.
    fn upsert_assignment(
        &self,
        group_id: u64,
        target: RoleTarget,
        role: Role,
        inherit_to_children: bool,
    ) -> Result<RoleAssignment, Self::Error>;

    /// Remove the assignment for `(group, target)`. Returns `false` if none
    /// existed.
    fn remove_assignment(&self, group_id: u64, target: RoleTarget) -> Result<bool, Self::Error>;

    /// Every stored assignment.
    fn all_assignments(&self) -> Result<Vec<RoleAssignment>, Self::Error>;
}
