// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entry::{AccessType, AclEntry};
use crate::error::AclError;
use crate::permission::{Permission, mask_serde};
use crate::principal::{Principal, principals_for};
use crate::resource::{Resource, ancestors};
use crate::role::{RoleAssignment, RoleMap};
use crate::traits::{AclStore, GroupMembership, ResourceCatalog, RoleStore};

/// Where a contributing entry came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// An explicit entry granted to the user itself.
    Direct,
    /// An explicit entry granted to one of the user's groups.
    Group,
    /// An implicit allow synthesized from a security-group role assignment.
    Role,
}

/// One entry that contributed to an effective permission set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub source: EntrySource,
    pub principal: Principal,
    pub resource: Resource,
    pub access_type: AccessType,
    #[serde(with = "mask_serde")]
    pub permissions: Permission,
}

/// The result of resolving a (user, resource) pair: the effective permission
/// set and every entry that went into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(with = "mask_serde")]
    pub effective: Permission,
    pub breakdown: Vec<Contribution>,
}

impl Evaluation {
    /// No matching entries: absence of access, not an error.
    pub fn empty() -> Self {
        Evaluation {
            effective: Permission::empty(),
            breakdown: Vec::new(),
        }
    }
}

/// Collect every contribution applicable to the given principal set and
/// ancestor chain.
///
/// An explicit entry applies when its principal is in the set and it either
/// sits at the target resource itself or at an ancestor with
/// `inherit_to_children`. Role assignments apply under the same inheritance
/// rule and always synthesize allows.
pub(crate) fn collect_contributions(
    principals: &[Principal],
    chain: &[Resource],
    entries: &[AclEntry],
    assignments: &[RoleAssignment],
    role_map: &RoleMap,
) -> Vec<Contribution> {
    let Some((target, inherited)) = chain.split_first() else {
        return Vec::new();
    };

    let applies = |resource: &Resource, inherit_to_children: bool| {
        resource == target || (inherit_to_children && inherited.contains(resource))
    };

    let mut contributions = Vec::new();

    for entry in entries {
        if !principals.contains(&entry.principal) {
            continue;
        }
        if !applies(&entry.resource, entry.inherit_to_children) {
            continue;
        }
        let source = match entry.principal {
            Principal::User(_) => EntrySource::Direct,
            Principal::Group(_) => EntrySource::Group,
        };
        contributions.push(Contribution {
            source,
            principal: entry.principal,
            resource: entry.resource,
            access_type: entry.access_type,
            permissions: entry.permissions,
        });
    }

    for assignment in assignments {
        let principal = Principal::Group(assignment.group_id);
        if !principals.contains(&principal) {
            continue;
        }
        let resource = assignment.target.resource();
        if !applies(&resource, assignment.inherit_to_children) {
            continue;
        }
        contributions.push(Contribution {
            source: EntrySource::Role,
            principal,
            resource,
            access_type: AccessType::Allow,
            permissions: role_map.permissions(assignment.role),
        });
    }

    contributions
}

/// Reduce contributions to the effective permission set.
///
/// Pure set algebra: union all allows, union all denies, then
/// `allow & !deny`. There is no "closest entry wins" rule; a denied bit is
/// gone regardless of where in the hierarchy the deny sits.
pub(crate) fn reduce(contributions: &[Contribution]) -> Permission {
    let mut allow = Permission::empty();
    let mut deny = Permission::empty();
    for contribution in contributions {
        match contribution.access_type {
            AccessType::Allow => allow |= contribution.permissions,
            AccessType::Deny => deny |= contribution.permissions,
        }
    }
    allow & !deny
}

/// Read-only permission resolution over injected collaborators.
///
/// Evaluation performs no mutation and no I/O beyond the store read and the
/// two collaborator lookups, so concurrent evaluations need no coordination.
pub struct Evaluator<'a, S, C, M> {
    store: &'a S,
    catalog: &'a C,
    membership: &'a M,
    role_map: &'a RoleMap,
}

impl<'a, S, C, M> Evaluator<'a, S, C, M>
where
    S: AclStore + RoleStore,
    C: ResourceCatalog,
    M: GroupMembership,
{
    pub fn new(store: &'a S, catalog: &'a C, membership: &'a M, role_map: &'a RoleMap) -> Self {
        Evaluator {
            store,
            catalog,
            membership,
            role_map,
        }
    }

    /// Compute the effective permission set and its breakdown for a user on a
    /// resource.
    ///
    /// Unresolvable resources and collaborator failures degrade to an empty
    /// evaluation rather than erroring: a caller probing a resource it cannot
    /// see learns nothing beyond "no access".
    pub fn evaluate(&self, user_id: u64, resource: Resource) -> Result<Evaluation, AclError> {
        let principals = match principals_for(self.membership, user_id) {
            Ok(principals) => principals,
            Err(error) => {
                warn!(user_id, %error, "principal expansion failed, degrading to no access");
                return Ok(Evaluation::empty());
            }
        };

        let chain = match ancestors(self.catalog, resource) {
            Ok(chain) => chain,
            Err(error) => {
                warn!(%resource, %error, "hierarchy resolution failed, degrading to no access");
                return Ok(Evaluation::empty());
            }
        };

        let entries = self
            .store
            .entries_for(&chain, &principals)
            .map_err(|error| AclError::Store(error.to_string()))?;

        let group_ids: Vec<u64> = principals
            .iter()
            .filter(|principal| principal.is_group())
            .map(|principal| principal.id())
            .collect();
        let assignments = self
            .store
            .assignments_for(&group_ids)
            .map_err(|error| AclError::Store(error.to_string()))?;

        let breakdown =
            collect_contributions(&principals, &chain, &entries, &assignments, self.role_map);
        Ok(Evaluation {
            effective: reduce(&breakdown),
            breakdown,
        })
    }

    /// Effective permission set only, without the breakdown.
    pub fn check(&self, user_id: u64, resource: Resource) -> Result<Permission, AclError> {
        Ok(self.evaluate(user_id, resource)?.effective)
    }

    /// The effective contribution of a single principal at a resource,
    /// inheritance included. Used for audit before/after snapshots, where
    /// group principals must be resolvable without enumerating their members.
    pub(crate) fn evaluate_principal(
        &self,
        principal: Principal,
        resource: Resource,
    ) -> Result<Permission, AclError> {
        let principals = [principal];
        let chain = match ancestors(self.catalog, resource) {
            Ok(chain) => chain,
            Err(_) => return Ok(Permission::empty()),
        };
        let entries = self
            .store
            .entries_for(&chain, &principals)
            .map_err(|error| AclError::Store(error.to_string()))?;
        let assignments = if let Principal::Group(group_id) = principal {
            self.store
                .assignments_for(&[group_id])
                .map_err(|error| AclError::Store(error.to_string()))?
        } else {
            Vec::new()
        };
        let contributions =
            collect_contributions(&principals, &chain, &entries, &assignments, self.role_map);
        Ok(reduce(&contributions))
    }
}
