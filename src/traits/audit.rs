// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::permission::{Permission, mask_serde};
use crate::principal::Principal;
use crate::resource::Resource;

/// The mutation kind an audit event was produced by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Grant,
    Deny,
    Revoke,
    Update,
    Delete,
    Copy,
    Template,
    Import,
    AssignRole,
    RemoveRole,
}

/// Before/after snapshot of one affected (resource, principal) pair.
///
/// The masks are the principal's own effective contribution at the resource
/// (its entries reduced with `allow & !deny`, inheritance included), captured
/// immediately before and after the mutation committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub operation: AuditOperation,
    pub resource: Resource,
    pub principal: Principal,
    #[serde(with = "mask_serde")]
    pub before: Permission,
    #[serde(with = "mask_serde")]
    pub after: Permission,
    pub recorded_at: u64,
}

/// Sink for audit events emitted by real mutations.
///
/// Simulation never reaches this trait. Recording is fire-and-forget: a sink
/// failure must not fail the mutation that produced the event.
pub trait AuditRecorder {
    fn record(&self, event: AuditEvent);
}
