// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::AclError;
use crate::permission::Permission;
use crate::resource::Resource;

/// Roles a security group can hold on a workspace or project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Member,
    Manager,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Viewer,
        Role::Member,
        Role::Manager,
        Role::Admin,
        Role::Owner,
    ];

    pub fn parse(name: &str) -> Result<Self, AclError> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == name)
            .ok_or_else(|| AclError::UnknownRole(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Member => "member",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The resource a role assignment applies to: exactly one of a workspace or a
/// project. The XOR rule is enforced at construction so a stored assignment
/// can never carry both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTarget {
    Workspace(u64),
    Project(u64),
}

impl RoleTarget {
    /// Build a target from optional wire fields, rejecting both-set and
    /// neither-set before any store access.
    pub fn new(workspace_id: Option<u64>, project_id: Option<u64>) -> Result<Self, AclError> {
        match (workspace_id, project_id) {
            (Some(workspace_id), None) => Ok(RoleTarget::Workspace(workspace_id)),
            (None, Some(project_id)) => Ok(RoleTarget::Project(project_id)),
            _ => Err(AclError::InvalidRoleTarget),
        }
    }

    /// The resource this target stands for.
    pub fn resource(&self) -> Resource {
        match self {
            RoleTarget::Workspace(id) => Resource::workspace(*id),
            RoleTarget::Project(id) => Resource::project(*id),
        }
    }
}

/// A role held by a security group on a workspace or project.
///
/// During evaluation an assignment synthesizes an implicit allow entry with
/// the role's permission set; it never contributes to the deny mask.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: u64,
    pub group_id: u64,
    pub target: RoleTarget,
    pub role: Role,
    pub inherit_to_children: bool,
    pub created_at: u64,
}

/// Configuration table mapping roles to permission sets.
///
/// The mapping is data, not logic: deployments can override single roles
/// without touching the evaluator.
#[derive(Clone, Debug)]
pub struct RoleMap {
    masks: HashMap<Role, Permission>,
}

impl RoleMap {
    /// Replace the permission set for one role.
    pub fn with_role(mut self, role: Role, permissions: Permission) -> Self {
        self.masks.insert(role, permissions);
        self
    }

    /// The permission set a role resolves to.
    pub fn permissions(&self, role: Role) -> Permission {
        self.masks.get(&role).copied().unwrap_or(Permission::empty())
    }
}

impl Default for RoleMap {
    fn default() -> Self {
        let masks = HashMap::from([
            (Role::Viewer, Permission::read_only()),
            (Role::Member, Permission::contributor()),
            (Role::Manager, Permission::editor()),
            (Role::Admin, Permission::full_control()),
            (Role::Owner, Permission::full_control()),
        ]);
        RoleMap { masks }
    }
}
