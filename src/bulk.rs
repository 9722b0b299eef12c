// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-principal and multi-resource mutations.
//!
//! Every bulk operation is per-item transactional: one failing principal or
//! target never blocks or rolls back the others. Failures are collected into
//! the returned report, never thrown.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::{AclEngine, store_error};
use crate::entry::{AccessType, AclEntry};
use crate::error::AclError;
use crate::evaluate::{collect_contributions, reduce};
use crate::permission::{Permission, Template, mask_serde};
use crate::principal::Principal;
use crate::resource::{Resource, ancestors};
use crate::traits::{AclStore, AuditOperation, AuditRecorder, GroupMembership, ResourceCatalog, RoleStore};

/// One failed item within a bulk operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkFailure {
    pub resource: Resource,
    pub principal: Principal,
    pub error: String,
}

/// Aggregate result of a per-principal bulk mutation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BulkReport {
    pub success: usize,
    pub failed: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    fn record(&mut self, resource: Resource, principal: Principal, result: Result<(), AclError>) {
        match result {
            Ok(()) => self.success += 1,
            Err(error) => {
                warn!(%resource, %principal, %error, "bulk item failed");
                self.failed += 1;
                self.failures.push(BulkFailure {
                    resource,
                    principal,
                    error: error.to_string(),
                });
            }
        }
    }
}

/// Aggregate result of a permission copy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CopyReport {
    pub copied_count: usize,
    pub skipped_count: usize,
    pub failed: usize,
    pub failures: Vec<BulkFailure>,
}

/// The hypothetical mutation a simulation runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SimulatedAction {
    Grant {
        #[serde(with = "mask_serde")]
        permissions: Permission,
        inherit_to_children: bool,
    },
    Deny {
        #[serde(with = "mask_serde")]
        permissions: Permission,
        inherit_to_children: bool,
    },
    Revoke,
}

/// Would-be effective contribution of one principal before and after a
/// simulated change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub principal: Principal,
    #[serde(with = "mask_serde")]
    pub before: Permission,
    #[serde(with = "mask_serde")]
    pub after: Permission,
}

impl<S, C, M, A> AclEngine<S, C, M, A>
where
    S: AclStore + RoleStore,
    C: ResourceCatalog,
    M: GroupMembership,
    A: AuditRecorder,
{
    /// Grant the same allow mask to many principals on one resource.
    pub fn bulk_grant(
        &self,
        resource: Resource,
        principals: &[Principal],
        permissions: Permission,
        inherit_to_children: bool,
    ) -> BulkReport {
        let mut report = BulkReport::default();
        for principal in principals {
            let result = self
                .grant(resource, *principal, permissions, inherit_to_children)
                .map(|_| ());
            report.record(resource, *principal, result);
        }
        debug!(%resource, success = report.success, failed = report.failed, "bulk grant done");
        report
    }

    /// Deny the same mask to many principals on one resource.
    pub fn bulk_deny(
        &self,
        resource: Resource,
        principals: &[Principal],
        permissions: Permission,
        inherit_to_children: bool,
    ) -> BulkReport {
        let mut report = BulkReport::default();
        for principal in principals {
            let result = self
                .deny(resource, *principal, permissions, inherit_to_children)
                .map(|_| ());
            report.record(resource, *principal, result);
        }
        debug!(%resource, success = report.success, failed = report.failed, "bulk deny done");
        report
    }

    /// Revoke all entries for many principals on one resource.
    pub fn bulk_revoke(&self, resource: Resource, principals: &[Principal]) -> BulkReport {
        let mut report = BulkReport::default();
        for principal in principals {
            let result = self.revoke_permission(resource, *principal).map(|_| ());
            report.record(resource, *principal, result);
        }
        debug!(%resource, success = report.success, failed = report.failed, "bulk revoke done");
        report
    }

    /// Apply a template preset to many principals on one resource.
    pub fn bulk_apply_template(
        &self,
        template: Template,
        resource: Resource,
        principals: &[Principal],
        inherit_to_children: bool,
    ) -> BulkReport {
        let mut report = BulkReport::default();
        for principal in principals {
            let result = self
                .apply_template(template, resource, *principal, inherit_to_children)
                .map(|_| ());
            report.record(resource, *principal, result);
        }
        report
    }

    /// Copy the entries stored explicitly at `source` onto each target.
    ///
    /// Inherited entries are not materialized; only rows stored at the source
    /// move. With `overwrite = false`, a principal that already holds any
    /// entry at a target is left untouched and counted as skipped. With
    /// `overwrite = true`, its existing rows are replaced by the source's.
    pub fn copy_permissions(
        &self,
        source: Resource,
        targets: &[Resource],
        overwrite: bool,
    ) -> Result<CopyReport, AclError> {
        self.require_resource(source)?;
        let source_entries = self.store.entries_at(&source).map_err(store_error)?;

        let mut principals: Vec<Principal> = source_entries
            .iter()
            .map(|entry| entry.principal)
            .collect();
        principals.sort();
        principals.dedup();

        let mut report = CopyReport::default();
        for target in targets {
            for principal in &principals {
                match self.copy_one(&source_entries, *target, *principal, overwrite) {
                    Ok(true) => report.copied_count += 1,
                    Ok(false) => report.skipped_count += 1,
                    Err(error) => {
                        warn!(%target, %principal, %error, "copy item failed");
                        report.failed += 1;
                        report.failures.push(BulkFailure {
                            resource: *target,
                            principal: *principal,
                            error: error.to_string(),
                        });
                    }
                }
            }
        }
        debug!(
            %source,
            copied = report.copied_count,
            skipped = report.skipped_count,
            failed = report.failed,
            "copy permissions done"
        );
        Ok(report)
    }

    fn copy_one(
        &self,
        source_entries: &[AclEntry],
        target: Resource,
        principal: Principal,
        overwrite: bool,
    ) -> Result<bool, AclError> {
        self.require_resource(target)?;

        let existing = self.store.entries_at(&target).map_err(store_error)?;
        let already_present = existing.iter().any(|entry| entry.principal == principal);
        if already_present && !overwrite {
            return Ok(false);
        }

        let before = self.snapshot(principal, target)?;
        // Invalidation must cover the rows being replaced as well as the new
        // ones: an overwritten inheriting row has cached resolutions at
        // descendant resources.
        let mut inherits = existing
            .iter()
            .filter(|entry| entry.principal == principal)
            .any(|entry| entry.inherit_to_children);
        if already_present {
            self.store
                .delete_for_principal(&target, &principal)
                .map_err(store_error)?;
        }
        for entry in source_entries
            .iter()
            .filter(|entry| entry.principal == principal)
        {
            self.store
                .upsert(
                    target,
                    principal,
                    entry.permissions,
                    entry.access_type,
                    entry.inherit_to_children,
                )
                .map_err(store_error)?;
            inherits |= entry.inherit_to_children;
        }
        self.cache.invalidate_entry(target, principal, inherits);
        let after = self.snapshot(principal, target)?;

        self.emit_audit(AuditOperation::Copy, target, principal, before, after);
        Ok(true)
    }

    /// Compute would-be effective permissions before and after a hypothetical
    /// mutation.
    ///
    /// Runs entirely over a cloned snapshot of the entry set: nothing is
    /// persisted and no audit event is emitted.
    pub fn simulate_change(
        &self,
        action: SimulatedAction,
        resource: Resource,
        principals: &[Principal],
    ) -> Result<Vec<SimulationOutcome>, AclError> {
        let chain = match ancestors(&self.catalog, resource) {
            Ok(chain) => chain,
            Err(AclError::ResourceNotFound(_)) => Vec::new(),
            Err(error) => return Err(error),
        };
        let snapshot = self.store.all_entries().map_err(store_error)?;
        let assignments = self.store.all_assignments().map_err(store_error)?;

        let mut outcomes = Vec::with_capacity(principals.len());
        for principal in principals {
            let principal_set = [*principal];
            let before = reduce(&collect_contributions(
                &principal_set,
                &chain,
                &snapshot,
                &assignments,
                &self.role_map,
            ));

            let mutated = apply_hypothetical(&snapshot, resource, *principal, &action);
            let after = reduce(&collect_contributions(
                &principal_set,
                &chain,
                &mutated,
                &assignments,
                &self.role_map,
            ));

            outcomes.push(SimulationOutcome {
                principal: *principal,
                before,
                after,
            });
        }
        Ok(outcomes)
    }
}

/// Apply the hypothetical action to a cloned entry set.
fn apply_hypothetical(
    snapshot: &[AclEntry],
    resource: Resource,
    principal: Principal,
    action: &SimulatedAction,
) -> Vec<AclEntry> {
    let mut entries: Vec<AclEntry> = snapshot.to_vec();
    match action {
        SimulatedAction::Grant {
            permissions,
            inherit_to_children,
        } => {
            entries.retain(|entry| {
                !(entry.resource == resource
                    && entry.principal == principal
                    && entry.access_type == AccessType::Allow)
            });
            entries.push(AclEntry {
                id: 0,
                resource,
                principal,
                permissions: *permissions,
                access_type: AccessType::Allow,
                inherit_to_children: *inherit_to_children,
                created_at: 0,
            });
        }
        SimulatedAction::Deny {
            permissions,
            inherit_to_children,
        } => {
            entries.retain(|entry| {
                !(entry.resource == resource
                    && entry.principal == principal
                    && entry.access_type == AccessType::Deny)
            });
            entries.push(AclEntry {
                id: 0,
                resource,
                principal,
                permissions: *permissions,
                access_type: AccessType::Deny,
                inherit_to_children: *inherit_to_children,
                created_at: 0,
            });
        }
        SimulatedAction::Revoke => {
            entries
                .retain(|entry| !(entry.resource == resource && entry.principal == principal));
        }
    }
    entries
}
