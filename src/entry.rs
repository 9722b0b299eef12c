// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::permission::{Permission, mask_serde};
use crate::principal::Principal;
use crate::resource::Resource;

/// Whether an entry contributes to the allow mask or the deny mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Allow,
    Deny,
}

impl Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessType::Allow => write!(f, "allow"),
            AccessType::Deny => write!(f, "deny"),
        }
    }
}

/// A stored grant or deny of a permission set to a principal on a resource.
///
/// At most one logical entry exists per [`EntryKey`]; granting again with the
/// same key is an upsert onto the existing row, never a second row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub id: u64,
    pub resource: Resource,
    pub principal: Principal,
    #[serde(with = "mask_serde")]
    pub permissions: Permission,
    pub access_type: AccessType,
    pub inherit_to_children: bool,
    pub created_at: u64,
}

impl AclEntry {
    /// The logical identity of this entry.
    pub fn key(&self) -> EntryKey {
        EntryKey {
            resource: self.resource,
            principal: self.principal,
            access_type: self.access_type,
        }
    }
}

/// The upsert identity of an ACL entry.
///
/// Mutations are serialized per key in the store so concurrent grants on the
/// same tuple cannot lose updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub resource: Resource,
    pub principal: Principal,
    pub access_type: AccessType,
}

/// Current unix timestamp in seconds, used for `created_at` metadata.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
