// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use tracing::debug;

use crate::cache::EffectiveCache;
use crate::entry::{AccessType, AclEntry, unix_now};
use crate::error::AclError;
use crate::evaluate::{Evaluation, Evaluator};
use crate::permission::{Permission, Template};
use crate::principal::Principal;
use crate::resource::{Resource, ancestors};
use crate::role::{Role, RoleAssignment, RoleMap, RoleTarget};
use crate::traits::{
    AclStore, AuditEvent, AuditOperation, AuditRecorder, GroupMembership, ResourceCatalog,
    RoleStore,
};

pub(crate) fn store_error(error: impl Error) -> AclError {
    AclError::Store(error.to_string())
}

pub(crate) fn collaborator_error(error: impl Error) -> AclError {
    AclError::Collaborator(error.to_string())
}

/// The ACL engine: store, collaborators, role table and cache wired into one
/// operation surface.
///
/// Reads (`check_permission`, `calculate_effective`, `list`) are lock-free
/// from the engine's side and may run concurrently. All real mutations funnel
/// through one internal path which snapshots effective permissions before and
/// after, emits one audit event per affected (resource, principal) pair and
/// invalidates the cache synchronously.
///
/// Enforcement of `MANAGE_PERMISSIONS` on the caller happens at the boundary:
/// callers run [`AclEngine::require_manage`] (or their own check) before
/// invoking a mutator.
pub struct AclEngine<S, C, M, A> {
    pub(crate) store: S,
    pub(crate) catalog: C,
    pub(crate) membership: M,
    pub(crate) audit: A,
    pub(crate) role_map: RoleMap,
    pub(crate) cache: EffectiveCache,
}

impl<S, C, M, A> AclEngine<S, C, M, A>
where
    S: AclStore + RoleStore,
    C: ResourceCatalog,
    M: GroupMembership,
    A: AuditRecorder,
{
    pub fn new(store: S, catalog: C, membership: M, audit: A) -> Self {
        AclEngine {
            store,
            catalog,
            membership,
            audit,
            role_map: RoleMap::default(),
            cache: EffectiveCache::new(),
        }
    }

    /// Swap the role-to-permission configuration table.
    pub fn with_role_map(mut self, role_map: RoleMap) -> Self {
        self.role_map = role_map;
        self
    }

    pub(crate) fn evaluator(&self) -> Evaluator<'_, S, C, M> {
        Evaluator::new(&self.store, &self.catalog, &self.membership, &self.role_map)
    }

    /// The named template presets and their masks.
    pub fn presets() -> [(&'static str, u32); 4] {
        [
            ("read_only", 1),
            ("contributor", 7),
            ("editor", 15),
            ("full_control", 31),
        ]
    }

    // Reads

    /// Raw entries stored at a resource, without inheritance resolution.
    pub fn list(&self, resource: Resource) -> Result<Vec<AclEntry>, AclError> {
        self.store.entries_at(&resource).map_err(store_error)
    }

    /// Effective permission mask for a user on a resource, cache-assisted.
    pub fn check_permission(&self, user_id: u64, resource: Resource) -> Result<Permission, AclError> {
        if let Some(effective) = self.cache.get(user_id, resource) {
            return Ok(effective);
        }
        // Record the invalidation generation before evaluating so a mask
        // computed over pre-mutation state can never land after a concurrent
        // invalidation.
        let generation = self.cache.generation();
        let effective = self.evaluator().check(user_id, resource)?;
        self.cache
            .put_if_current(user_id, resource, effective, generation);
        Ok(effective)
    }

    /// Effective permissions plus the breakdown of contributing entries.
    pub fn calculate_effective(
        &self,
        user_id: u64,
        resource: Resource,
    ) -> Result<Evaluation, AclError> {
        self.evaluator().evaluate(user_id, resource)
    }

    /// Boundary check for mutating callers: the user must hold
    /// `MANAGE_PERMISSIONS` on the resource, directly or via an inheriting
    /// ancestor entry.
    pub fn require_manage(&self, user_id: u64, resource: Resource) -> Result<(), AclError> {
        let effective = self.check_permission(user_id, resource)?;
        if effective.contains(Permission::MANAGE_PERMISSIONS) {
            Ok(())
        } else {
            Err(AclError::AccessDenied { user_id, resource })
        }
    }

    // Validation shared by the administrative mutators. These surface
    // not-found instead of degrading, unlike evaluation.

    pub(crate) fn require_resource(&self, resource: Resource) -> Result<(), AclError> {
        Resource::new(resource.resource_type, resource.resource_id)?;
        ancestors(&self.catalog, resource)?;
        Ok(())
    }

    pub(crate) fn require_principal(&self, principal: Principal) -> Result<(), AclError> {
        let exists = match principal {
            Principal::User(id) => self.membership.user_exists(id),
            Principal::Group(id) => self.membership.group_exists(id),
        }
        .map_err(collaborator_error)?;
        if exists {
            Ok(())
        } else {
            Err(AclError::PrincipalNotFound(principal))
        }
    }

    pub(crate) fn emit_audit(
        &self,
        operation: AuditOperation,
        resource: Resource,
        principal: Principal,
        before: Permission,
        after: Permission,
    ) {
        self.audit.record(AuditEvent {
            operation,
            resource,
            principal,
            before,
            after,
            recorded_at: unix_now(),
        });
    }

    pub(crate) fn snapshot(
        &self,
        principal: Principal,
        resource: Resource,
    ) -> Result<Permission, AclError> {
        self.evaluator().evaluate_principal(principal, resource)
    }

    /// One entry mutation with validation, audit snapshots and cache
    /// invalidation. All grant/deny paths, bulk included, come through here.
    pub(crate) fn apply_entry(
        &self,
        operation: AuditOperation,
        resource: Resource,
        principal: Principal,
        permissions: Permission,
        access_type: AccessType,
        inherit_to_children: bool,
    ) -> Result<AclEntry, AclError> {
        self.require_resource(resource)?;
        self.require_principal(principal)?;

        let before = self.snapshot(principal, resource)?;
        let entry = self
            .store
            .upsert(resource, principal, permissions, access_type, inherit_to_children)
            .map_err(store_error)?;
        self.cache
            .invalidate_entry(resource, principal, inherit_to_children);
        let after = self.snapshot(principal, resource)?;

        debug!(%resource, %principal, %access_type, mask = permissions.mask(), "entry upserted");
        self.emit_audit(operation, resource, principal, before, after);
        Ok(entry)
    }

    // Single-entry mutators

    /// Upsert an allow entry. Granting an identical mask twice is a no-op on
    /// effective state.
    pub fn grant(
        &self,
        resource: Resource,
        principal: Principal,
        permissions: Permission,
        inherit_to_children: bool,
    ) -> Result<AclEntry, AclError> {
        self.apply_entry(
            AuditOperation::Grant,
            resource,
            principal,
            permissions,
            AccessType::Allow,
            inherit_to_children,
        )
    }

    /// Upsert a deny entry.
    pub fn deny(
        &self,
        resource: Resource,
        principal: Principal,
        permissions: Permission,
        inherit_to_children: bool,
    ) -> Result<AclEntry, AclError> {
        self.apply_entry(
            AuditOperation::Deny,
            resource,
            principal,
            permissions,
            AccessType::Deny,
            inherit_to_children,
        )
    }

    /// Delete every entry, allow and deny, for the principal at exactly this
    /// resource. Revoking where nothing exists succeeds silently.
    pub fn revoke_permission(
        &self,
        resource: Resource,
        principal: Principal,
    ) -> Result<usize, AclError> {
        self.require_resource(resource)?;
        self.require_principal(principal)?;

        let before = self.snapshot(principal, resource)?;
        let removed = self
            .store
            .delete_for_principal(&resource, &principal)
            .map_err(store_error)?;
        if removed == 0 {
            return Ok(0);
        }
        // Revoked entries may have been inheriting; flush broadly.
        self.cache.invalidate_entry(resource, principal, true);
        let after = self.snapshot(principal, resource)?;

        debug!(%resource, %principal, removed, "entries revoked");
        self.emit_audit(AuditOperation::Revoke, resource, principal, before, after);
        Ok(removed)
    }

    /// Replace permissions and inheritance on an existing row.
    pub fn update_acl(
        &self,
        id: u64,
        permissions: Permission,
        inherit_to_children: bool,
    ) -> Result<AclEntry, AclError> {
        let existing = self
            .store
            .get(id)
            .map_err(store_error)?
            .ok_or(AclError::EntryNotFound(id))?;

        let before = self.snapshot(existing.principal, existing.resource)?;
        let updated = self
            .store
            .update(id, permissions, inherit_to_children)
            .map_err(store_error)?
            .ok_or(AclError::EntryNotFound(id))?;
        self.cache.invalidate_entry(
            existing.resource,
            existing.principal,
            inherit_to_children || existing.inherit_to_children,
        );
        let after = self.snapshot(existing.principal, existing.resource)?;

        self.emit_audit(
            AuditOperation::Update,
            existing.resource,
            existing.principal,
            before,
            after,
        );
        Ok(updated)
    }

    /// Delete one row by id. Unknown ids are surfaced to the administrative
    /// caller, unlike `revoke_permission`.
    pub fn delete_acl(&self, id: u64) -> Result<AclEntry, AclError> {
        let existing = self
            .store
            .get(id)
            .map_err(store_error)?
            .ok_or(AclError::EntryNotFound(id))?;

        let before = self.snapshot(existing.principal, existing.resource)?;
        self.store.delete(id).map_err(store_error)?;
        self.cache.invalidate_entry(
            existing.resource,
            existing.principal,
            existing.inherit_to_children,
        );
        let after = self.snapshot(existing.principal, existing.resource)?;

        self.emit_audit(
            AuditOperation::Delete,
            existing.resource,
            existing.principal,
            before,
            after,
        );
        Ok(existing)
    }

    // Role assignments

    /// Assign a role to a security group on exactly one of a workspace or a
    /// project.
    pub fn assign_role(
        &self,
        group_id: u64,
        workspace_id: Option<u64>,
        project_id: Option<u64>,
        role: Role,
        inherit_to_children: bool,
    ) -> Result<RoleAssignment, AclError> {
        let target = RoleTarget::new(workspace_id, project_id)?;

        if !self
            .membership
            .group_exists(group_id)
            .map_err(collaborator_error)?
        {
            return Err(AclError::PrincipalNotFound(Principal::Group(group_id)));
        }
        if self
            .membership
            .is_protected_group(group_id)
            .map_err(collaborator_error)?
        {
            return Err(AclError::ProtectedGroup(group_id));
        }
        if !self
            .membership
            .is_security_group(group_id)
            .map_err(collaborator_error)?
        {
            return Err(AclError::NotSecurityGroup(group_id));
        }
        let resource = target.resource();
        self.require_resource(resource)?;

        let principal = Principal::Group(group_id);
        let before = self.snapshot(principal, resource)?;
        let assignment = self
            .store
            .upsert_assignment(group_id, target, role, inherit_to_children)
            .map_err(store_error)?;
        self.cache.invalidate_all();
        let after = self.snapshot(principal, resource)?;

        debug!(group_id, %resource, %role, "role assigned");
        self.emit_audit(AuditOperation::AssignRole, resource, principal, before, after);
        Ok(assignment)
    }

    /// Remove a group's role on a target. Removing an absent assignment
    /// succeeds silently.
    pub fn remove_role(&self, group_id: u64, target: RoleTarget) -> Result<bool, AclError> {
        if self
            .membership
            .is_protected_group(group_id)
            .map_err(collaborator_error)?
        {
            return Err(AclError::ProtectedGroup(group_id));
        }

        let resource = target.resource();
        let principal = Principal::Group(group_id);
        let before = self.snapshot(principal, resource)?;
        let removed = self
            .store
            .remove_assignment(group_id, target)
            .map_err(store_error)?;
        if !removed {
            return Ok(false);
        }
        self.cache.invalidate_all();
        let after = self.snapshot(principal, resource)?;

        debug!(group_id, %resource, "role removed");
        self.emit_audit(AuditOperation::RemoveRole, resource, principal, before, after);
        Ok(true)
    }

    /// All stored role assignments.
    pub fn list_roles(&self) -> Result<Vec<RoleAssignment>, AclError> {
        self.store.all_assignments().map_err(store_error)
    }

    /// Hook for the membership collaborator: call when a user's group set
    /// changed so cached resolutions for that user are dropped.
    pub fn invalidate_user(&self, user_id: u64) {
        self.cache.invalidate_user(user_id);
    }

    /// Grant a named template preset. Thin wrapper over [`AclEngine::grant`]
    /// with the preset's fixed mask.
    pub fn apply_template(
        &self,
        template: Template,
        resource: Resource,
        principal: Principal,
        inherit_to_children: bool,
    ) -> Result<AclEntry, AclError> {
        self.apply_entry(
            AuditOperation::Template,
            resource,
            principal,
            template.permissions(),
            AccessType::Allow,
            inherit_to_children,
        )
    }
}
