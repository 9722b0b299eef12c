// SPDX-License-Identifier: MIT OR Apache-2.0

mod audit;
mod catalog;
mod membership;
mod store;

pub use audit::{AuditEvent, AuditOperation, AuditRecorder};
pub use catalog::ResourceCatalog;
pub use membership::GroupMembership;
pub use store::{AclStore, RoleStore};
