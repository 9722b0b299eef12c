// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::principal::Principal;
use crate::resource::{Resource, ResourceType};

/// Errors returned by the ACL engine and its components.
///
/// Validation errors are raised before any store access, so a failed call is
/// never partially applied. Collaborator failures during read-only evaluation
/// are _not_ surfaced through this type; evaluation degrades to an empty
/// permission set instead.
#[derive(Debug, Error)]
pub enum AclError {
    #[error("permission mask {0} outside valid range [0,31]")]
    InvalidMask(u32),

    #[error("unknown resource type \"{0}\"")]
    UnknownResourceType(String),

    #[error("resource type {0} requires a resource id")]
    MissingResourceId(ResourceType),

    #[error("resource type {0} does not take a resource id")]
    UnexpectedResourceId(ResourceType),

    #[error("resource {0} not found in catalog")]
    ResourceNotFound(Resource),

    #[error("principal {0} not found")]
    PrincipalNotFound(Principal),

    #[error("acl entry {0} not found")]
    EntryNotFound(u64),

    #[error("role assignment requires exactly one of workspace id or project id")]
    InvalidRoleTarget,

    #[error("unknown role \"{0}\"")]
    UnknownRole(String),

    #[error("unknown template \"{0}\"")]
    UnknownTemplate(String),

    #[error("unknown transfer format \"{0}\"")]
    UnknownFormat(String),

    #[error("group {0} is not a security group and cannot hold role assignments")]
    NotSecurityGroup(u64),

    #[error("group {0} is protected and cannot be modified")]
    ProtectedGroup(u64),

    #[error("user {user_id} does not hold manage permissions on {resource}")]
    AccessDenied { user_id: u64, resource: Resource },

    #[error("malformed import data: {0}")]
    MalformedImport(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("entry store failed: {0}")]
    Store(String),

    #[error("collaborator lookup failed: {0}")]
    Collaborator(String),
}
