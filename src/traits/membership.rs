// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

/// Interface to the external identity and group-membership store.
///
/// Membership is flat: a user belongs to zero or more groups and groups are
/// never nested inside each other.
pub trait GroupMembership {
    type Error: Error;

    /// Return `true` if the user exists.
    fn user_exists(&self, user_id: u64) -> Result<bool, Self::Error>;

    /// Return `true` if the group exists.
    fn group_exists(&self, group_id: u64) -> Result<bool, Self::Error>;

    /// All groups the user is a direct member of.
    fn groups_for(&self, user_id: u64) -> Result<Vec<u64>, Self::Error>;

    /// Return `true` if the group is a security group, eligible for
    /// workspace/project role assignments.
    fn is_security_group(&self, group_id: u64) -> Result<bool, Self::Error>;

    /// Return `true` if the group is protected against administrative
    /// modification (system groups, the domain-admin group).
    fn is_protected_group(&self, group_id: u64) -> Result<bool, Self::Error>;
}
