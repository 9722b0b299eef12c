// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical, bitmask-based ACL evaluation and bulk mutation engine.
//!
//! For any (user, resource) pair the engine computes an *effective
//! permission set* from overlapping sources: direct grants, group
//! membership, structural inheritance down the resource hierarchy, and
//! role-based security-group assignments. Precedence is deterministic set
//! algebra: all allows are unioned, all denies are unioned, and
//! `effective = allow & !deny`. A denied bit is gone no matter how close or
//! far its source sits in the hierarchy.
//!
//! The resource catalog, identity store and audit sink stay outside the
//! engine, injected through the traits in [`traits`]. A bundled
//! [`store::MemoryStore`] covers tests and single-process deployments.
//!
//! ```
//! use acl_engine::{AclEngine, Permission, Principal, Resource};
//! use acl_engine::store::MemoryStore;
//! use acl_engine::test_utils::{TestAudit, TestCatalog, TestMembership};
//!
//! let catalog = TestCatalog::default().with_project(10, 1);
//! let membership = TestMembership::default().with_user(7);
//! let engine = AclEngine::new(MemoryStore::new(), catalog, membership, TestAudit::new());
//!
//! engine
//!     .grant(Resource::workspace(1), Principal::User(7), Permission::contributor(), true)
//!     .unwrap();
//!
//! // The workspace grant inherits down to the project.
//! let effective = engine.check_permission(7, Resource::project(10)).unwrap();
//! assert_eq!(effective, Permission::contributor());
//! ```

mod bulk;
mod cache;
mod engine;
mod entry;
mod error;
mod evaluate;
mod permission;
mod principal;
mod resource;
mod role;
pub mod store;
pub mod test_utils;
mod transfer;
pub mod traits;

#[cfg(test)]
mod tests;

pub use bulk::{BulkFailure, BulkReport, CopyReport, SimulatedAction, SimulationOutcome};
pub use cache::EffectiveCache;
pub use engine::AclEngine;
pub use entry::{AccessType, AclEntry, EntryKey};
pub use error::AclError;
pub use evaluate::{Contribution, EntrySource, Evaluation, Evaluator};
pub use permission::{Permission, Template};
pub use principal::{Principal, principals_for};
pub use resource::{Resource, ResourceType, ancestors};
pub use role::{Role, RoleAssignment, RoleMap, RoleTarget};
pub use transfer::{
    EntryFilter, EntryRecord, ImportMode, ImportReport, TransferFormat, parse_records,
    serialize_records,
};
