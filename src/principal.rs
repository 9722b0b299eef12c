// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::AclError;
use crate::traits::GroupMembership;

/// A principal which can hold permissions: a single user or a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    User(u64),
    Group(u64),
}

impl Principal {
    /// Return the ID of the principal.
    pub fn id(&self) -> u64 {
        match self {
            Principal::User(id) => *id,
            Principal::Group(id) => *id,
        }
    }

    /// Return `true` if this principal is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Principal::Group(_))
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::User(id) => write!(f, "user:{id}"),
            Principal::Group(id) => write!(f, "group:{id}"),
        }
    }
}

/// Expand a user into the full set of principals acting on its behalf: the
/// user itself plus every group it is a direct member of.
///
/// Groups are never nested, so no recursion happens here. The result is
/// computed fresh on every call; nothing is cached across requests.
pub fn principals_for<M: GroupMembership>(
    membership: &M,
    user_id: u64,
) -> Result<Vec<Principal>, AclError> {
    let groups = membership
        .groups_for(user_id)
        .map_err(|error| AclError::Collaborator(error.to_string()))?;

    let mut principals = Vec::with_capacity(1 + groups.len());
    principals.push(Principal::User(user_id));
    principals.extend(groups.into_iter().map(Principal::Group));
    Ok(principals)
}
