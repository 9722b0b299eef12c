// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over the full engine: store, hierarchy, membership,
//! roles, bulk operations, transfer and audit wired together.

use rand::Rng;

use crate::bulk::SimulatedAction;
use crate::engine::AclEngine;
use crate::entry::AccessType;
use crate::permission::{Permission, Template};
use crate::principal::Principal;
use crate::resource::Resource;
use crate::role::{Role, RoleTarget};
use crate::store::MemoryStore;
use crate::test_utils::{TestAudit, TestCatalog, TestMembership};
use crate::traits::{AclStore, AuditOperation};
use crate::transfer::{EntryFilter, ImportMode, TransferFormat};
use crate::error::AclError;

type TestEngine = AclEngine<MemoryStore, TestCatalog, TestMembership, TestAudit>;

fn engine() -> (TestEngine, TestAudit) {
    let catalog = TestCatalog::default()
        .with_workspace(1)
        .with_workspace(2)
        .with_project(10, 1)
        .with_project(20, 2)
        .with_feature(100, 10);
    let membership = TestMembership::default()
        .with_user(7)
        .with_user(8)
        .with_member(7, 50)
        .with_security_group(50)
        .with_security_group(60)
        .with_protected_group(99);
    let audit = TestAudit::new();
    let engine = AclEngine::new(MemoryStore::new(), catalog, membership, audit.clone());
    (engine, audit)
}

#[test]
fn contributor_grant_inherits_and_deny_is_local() {
    let (engine, _) = engine();

    engine
        .grant(
            Resource::workspace(1),
            Principal::User(7),
            Permission::contributor(),
            true,
        )
        .unwrap();

    // The workspace grant flows down to the project.
    assert_eq!(
        engine.check_permission(7, Resource::project(10)).unwrap().mask(),
        7
    );

    // A deny of Write directly on the project clears bit 2 there only.
    engine
        .deny(
            Resource::project(10),
            Principal::User(7),
            Permission::WRITE,
            false,
        )
        .unwrap();
    assert_eq!(
        engine.check_permission(7, Resource::project(10)).unwrap().mask(),
        5
    );
    assert_eq!(
        engine.check_permission(7, Resource::workspace(1)).unwrap().mask(),
        7
    );
}

#[test]
fn deny_wins_regardless_of_distance() {
    let (engine, _) = engine();

    // Closer allow at the feature, deny far up at the workspace.
    engine
        .grant(
            Resource::feature(100),
            Principal::User(7),
            Permission::full_control(),
            false,
        )
        .unwrap();
    engine
        .deny(
            Resource::workspace(1),
            Principal::User(7),
            Permission::WRITE,
            true,
        )
        .unwrap();

    let effective = engine.check_permission(7, Resource::feature(100)).unwrap();
    assert!(!effective.contains(Permission::WRITE));
    assert!(effective.contains(Permission::MANAGE_PERMISSIONS));
}

#[test]
fn grant_and_revoke_are_idempotent() {
    let (engine, _) = engine();
    let resource = Resource::workspace(1);
    let user = Principal::User(7);

    engine
        .grant(resource, user, Permission::editor(), false)
        .unwrap();
    let once = engine.check_permission(7, resource).unwrap();
    engine
        .grant(resource, user, Permission::editor(), false)
        .unwrap();
    let twice = engine.check_permission(7, resource).unwrap();
    assert_eq!(once, twice);
    assert_eq!(engine.list(resource).unwrap().len(), 1);

    assert_eq!(engine.revoke_permission(resource, user).unwrap(), 1);
    assert_eq!(engine.revoke_permission(resource, user).unwrap(), 0);
    assert!(engine.check_permission(7, resource).unwrap().is_empty());
}

#[test]
fn role_assignment_grants_through_security_group() {
    let (engine, _) = engine();

    engine
        .assign_role(50, Some(1), None, Role::Member, true)
        .unwrap();

    // User 7 is in group 50; the workspace role reaches the project below.
    assert_eq!(
        engine.check_permission(7, Resource::project(10)).unwrap().mask(),
        7
    );
    // User 8 is not a member.
    assert!(engine.check_permission(8, Resource::project(10)).unwrap().is_empty());

    // Direct deny still strips bits from the role-derived allow.
    engine
        .deny(
            Resource::project(10),
            Principal::User(7),
            Permission::WRITE,
            false,
        )
        .unwrap();
    assert_eq!(
        engine.check_permission(7, Resource::project(10)).unwrap().mask(),
        5
    );
}

#[test]
fn role_target_and_group_validation() {
    let (engine, _) = engine();

    assert!(matches!(
        engine.assign_role(50, Some(1), Some(10), Role::Member, false),
        Err(AclError::InvalidRoleTarget)
    ));
    assert!(matches!(
        engine.assign_role(50, None, None, Role::Member, false),
        Err(AclError::InvalidRoleTarget)
    ));
    // Group 70 does not exist at all.
    assert!(matches!(
        engine.assign_role(70, Some(1), None, Role::Member, false),
        Err(AclError::PrincipalNotFound(_))
    ));
    // Group 99 is protected.
    assert!(matches!(
        engine.assign_role(99, Some(1), None, Role::Member, false),
        Err(AclError::ProtectedGroup(99))
    ));
    // Removing a role that is not there is a silent no-op.
    assert!(!engine.remove_role(60, RoleTarget::Workspace(1)).unwrap());
}

#[test]
fn ordinary_group_cannot_hold_roles() {
    let catalog = TestCatalog::default().with_workspace(1);
    let membership = TestMembership::default().with_group(40);
    let engine = AclEngine::new(MemoryStore::new(), catalog, membership, TestAudit::new());

    assert!(matches!(
        engine.assign_role(40, Some(1), None, Role::Viewer, false),
        Err(AclError::NotSecurityGroup(40))
    ));
}

#[test]
fn bulk_grant_isolates_per_item_failures() {
    let (engine, _) = engine();

    let principals = [
        Principal::User(7),
        Principal::User(404), // unknown, must not block the others
        Principal::User(8),
    ];
    let report = engine.bulk_grant(
        Resource::workspace(1),
        &principals,
        Permission::read_only(),
        false,
    );

    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].principal, Principal::User(404));

    assert_eq!(engine.check_permission(7, Resource::workspace(1)).unwrap().mask(), 1);
    assert_eq!(engine.check_permission(8, Resource::workspace(1)).unwrap().mask(), 1);
}

#[test]
fn copy_permissions_counts_skipped_and_overwritten() {
    let (engine, _) = engine();
    let source = Resource::workspace(1);

    engine
        .grant(source, Principal::User(7), Permission::editor(), true)
        .unwrap();
    engine
        .grant(source, Principal::User(8), Permission::read_only(), false)
        .unwrap();

    // User 7 already holds an entry at the target.
    engine
        .grant(Resource::workspace(2), Principal::User(7), Permission::read_only(), false)
        .unwrap();

    let report = engine
        .copy_permissions(source, &[Resource::workspace(2)], false)
        .unwrap();
    assert_eq!(report.copied_count, 1);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(
        engine.check_permission(7, Resource::workspace(2)).unwrap().mask(),
        1
    );

    let report = engine
        .copy_permissions(source, &[Resource::workspace(2)], true)
        .unwrap();
    assert_eq!(report.copied_count, 2);
    assert_eq!(report.skipped_count, 0);
    assert_eq!(
        engine.check_permission(7, Resource::workspace(2)).unwrap().mask(),
        15
    );
}

#[test]
fn copy_moves_only_explicit_entries() {
    let (engine, _) = engine();

    // An inheriting workspace entry is visible at the project but not stored
    // there, so a copy from the project carries nothing.
    engine
        .grant(
            Resource::workspace(1),
            Principal::User(7),
            Permission::contributor(),
            true,
        )
        .unwrap();

    let report = engine
        .copy_permissions(Resource::project(10), &[Resource::workspace(2)], false)
        .unwrap();
    assert_eq!(report.copied_count, 0);
    assert!(engine.list(Resource::workspace(2)).unwrap().is_empty());
}

#[test]
fn apply_template_uses_exact_preset_masks() {
    let (engine, _) = engine();

    engine
        .apply_template(
            Template::FullControl,
            Resource::workspace(1),
            Principal::User(7),
            false,
        )
        .unwrap();
    assert_eq!(
        engine.check_permission(7, Resource::workspace(1)).unwrap().mask(),
        31
    );

    let presets = TestEngine::presets();
    assert_eq!(
        presets,
        [
            ("read_only", 1),
            ("contributor", 7),
            ("editor", 15),
            ("full_control", 31),
        ]
    );
}

#[test]
fn simulate_reports_change_without_persisting() {
    let (engine, audit) = engine();
    let resource = Resource::workspace(1);
    let user = Principal::User(7);

    engine
        .grant(resource, user, Permission::full_control(), false)
        .unwrap();
    let audited_before = audit.events().len();

    let outcomes = engine
        .simulate_change(
            SimulatedAction::Deny {
                permissions: Permission::WRITE,
                inherit_to_children: false,
            },
            resource,
            &[user],
        )
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].before.mask(), 31);
    assert_eq!(outcomes[0].after.mask(), 29);

    // Nothing was stored and nothing was audited.
    assert_eq!(engine.list(resource).unwrap().len(), 1);
    assert_eq!(engine.check_permission(7, resource).unwrap().mask(), 31);
    assert_eq!(audit.events().len(), audited_before);
}

#[test]
fn simulate_revoke_covers_allow_and_deny() {
    let (engine, _) = engine();
    let resource = Resource::project(10);
    let user = Principal::User(7);

    engine
        .grant(resource, user, Permission::contributor(), false)
        .unwrap();
    engine
        .deny(resource, user, Permission::WRITE, false)
        .unwrap();

    let outcomes = engine
        .simulate_change(SimulatedAction::Revoke, resource, &[user])
        .unwrap();
    assert_eq!(outcomes[0].before.mask(), 5);
    assert_eq!(outcomes[0].after.mask(), 0);
}

#[test]
fn export_import_round_trips_logical_entries() {
    let (engine, _) = engine();

    engine
        .grant(
            Resource::workspace(1),
            Principal::User(7),
            Permission::contributor(),
            true,
        )
        .unwrap();
    engine
        .deny(
            Resource::project(10),
            Principal::Group(50),
            Permission::DELETE,
            false,
        )
        .unwrap();

    let exported = engine
        .export(TransferFormat::Json, &EntryFilter::default())
        .unwrap();

    // Import into a fresh engine over the same catalog and membership.
    let (other, _) = self::engine();
    let report = other
        .import(&exported, TransferFormat::Json, ImportMode::Overwrite)
        .unwrap();
    assert_eq!(report.imported, 2);
    assert_eq!(report.failed, 0);

    let mut original: Vec<_> = engine
        .store
        .all_entries()
        .unwrap()
        .iter()
        .map(|e| (e.resource, e.principal, e.access_type, e.permissions, e.inherit_to_children))
        .collect();
    let mut reimported: Vec<_> = other
        .store
        .all_entries()
        .unwrap()
        .iter()
        .map(|e| (e.resource, e.principal, e.access_type, e.permissions, e.inherit_to_children))
        .collect();
    original.sort();
    reimported.sort();
    assert_eq!(original, reimported);
}

#[test]
fn import_modes_skip_and_merge() {
    let (engine, _) = engine();
    let resource = Resource::workspace(1);
    let user = Principal::User(7);

    engine
        .grant(resource, user, Permission::read_only(), false)
        .unwrap();

    let incoming = r#"[{
        "resource_type": "workspace",
        "resource_id": 1,
        "principal": { "kind": "user", "id": 7 },
        "access_type": "allow",
        "permissions": 6,
        "inherit_to_children": true
    }]"#;

    let report = engine
        .import(incoming, TransferFormat::Json, ImportMode::Skip)
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(engine.check_permission(7, resource).unwrap().mask(), 1);

    let report = engine
        .import(incoming, TransferFormat::Json, ImportMode::Merge)
        .unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(engine.check_permission(7, resource).unwrap().mask(), 7);

    let report = engine
        .import(incoming, TransferFormat::Json, ImportMode::Overwrite)
        .unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(engine.check_permission(7, resource).unwrap().mask(), 6);
}

#[test]
fn import_rejects_invalid_mask_before_applying() {
    let (engine, _) = engine();

    let incoming = r#"[{
        "resource_type": "workspace",
        "resource_id": 1,
        "principal": { "kind": "user", "id": 7 },
        "access_type": "allow",
        "permissions": 64,
        "inherit_to_children": false
    }]"#;

    assert!(matches!(
        engine.import(incoming, TransferFormat::Json, ImportMode::Overwrite),
        Err(AclError::InvalidMask(64))
    ));
    assert!(engine.list(Resource::workspace(1)).unwrap().is_empty());
}

#[test]
fn audit_events_carry_before_and_after_masks() {
    let (engine, audit) = engine();
    let resource = Resource::workspace(1);
    let user = Principal::User(7);

    engine
        .grant(resource, user, Permission::contributor(), false)
        .unwrap();
    engine
        .deny(resource, user, Permission::WRITE, false)
        .unwrap();
    engine.revoke_permission(resource, user).unwrap();

    let events = audit.events();
    assert_eq!(events.len(), 3);

    assert_eq!(events[0].operation, AuditOperation::Grant);
    assert_eq!(events[0].before.mask(), 0);
    assert_eq!(events[0].after.mask(), 7);

    assert_eq!(events[1].operation, AuditOperation::Deny);
    assert_eq!(events[1].before.mask(), 7);
    assert_eq!(events[1].after.mask(), 5);

    assert_eq!(events[2].operation, AuditOperation::Revoke);
    assert_eq!(events[2].before.mask(), 5);
    assert_eq!(events[2].after.mask(), 0);
}

#[test]
fn update_and_delete_surface_unknown_ids() {
    let (engine, _) = engine();

    assert!(matches!(
        engine.update_acl(404, Permission::read_only(), false),
        Err(AclError::EntryNotFound(404))
    ));
    assert!(matches!(engine.delete_acl(404), Err(AclError::EntryNotFound(404))));

    let entry = engine
        .grant(Resource::workspace(1), Principal::User(7), Permission::read_only(), false)
        .unwrap();
    let updated = engine.update_acl(entry.id, Permission::editor(), true).unwrap();
    assert_eq!(updated.permissions, Permission::editor());
    assert!(updated.inherit_to_children);

    engine.delete_acl(entry.id).unwrap();
    assert!(engine.list(Resource::workspace(1)).unwrap().is_empty());
}

#[test]
fn require_manage_gates_on_bit_16() {
    let (engine, _) = engine();

    assert!(matches!(
        engine.require_manage(7, Resource::workspace(1)),
        Err(AclError::AccessDenied { user_id: 7, .. })
    ));

    engine
        .grant(
            Resource::workspace(1),
            Principal::User(7),
            Permission::MANAGE_PERMISSIONS,
            true,
        )
        .unwrap();
    assert!(engine.require_manage(7, Resource::workspace(1)).is_ok());
    // Inherited manage bit is enough at the project below.
    assert!(engine.require_manage(7, Resource::project(10)).is_ok());
}

#[test]
fn catalog_outage_degrades_to_no_access() {
    let catalog = TestCatalog::default().with_workspace(1).unavailable();
    let membership = TestMembership::default().with_user(7);
    let engine = AclEngine::new(MemoryStore::new(), catalog, membership, TestAudit::new());

    let evaluation = engine.calculate_effective(7, Resource::workspace(1)).unwrap();
    assert!(evaluation.effective.is_empty());

    // Administrative mutation surfaces the failure instead.
    assert!(engine
        .grant(Resource::workspace(1), Principal::User(7), Permission::read_only(), false)
        .is_err());
}

#[test]
fn mutation_invalidates_cached_resolutions() {
    let (engine, _) = engine();
    let resource = Resource::project(10);
    let user = Principal::User(7);

    engine
        .grant(resource, user, Permission::read_only(), false)
        .unwrap();
    assert_eq!(engine.check_permission(7, resource).unwrap().mask(), 1);

    // A second grant must show through immediately, not serve a stale mask.
    engine
        .grant(resource, user, Permission::editor(), false)
        .unwrap();
    assert_eq!(engine.check_permission(7, resource).unwrap().mask(), 15);

    engine.revoke_permission(resource, user).unwrap();
    assert_eq!(engine.check_permission(7, resource).unwrap().mask(), 0);
}

#[test]
fn copy_overwrite_invalidates_descendants_of_replaced_rows() {
    let (engine, _) = engine();
    let user = Principal::User(7);

    // An inheriting grant on the workspace resolves and caches at the
    // project below it.
    engine
        .grant(Resource::workspace(2), user, Permission::contributor(), true)
        .unwrap();
    assert_eq!(
        engine.check_permission(7, Resource::project(20)).unwrap().mask(),
        7
    );

    // Overwrite-copy a non-inheriting row onto the workspace. The replaced
    // inheriting row backed the cached project resolution, so that key must
    // go too.
    engine
        .grant(Resource::workspace(1), user, Permission::read_only(), false)
        .unwrap();
    let report = engine
        .copy_permissions(Resource::workspace(1), &[Resource::workspace(2)], true)
        .unwrap();
    assert_eq!(report.copied_count, 1);

    assert_eq!(
        engine.check_permission(7, Resource::project(20)).unwrap().mask(),
        0
    );
    assert_eq!(
        engine.check_permission(7, Resource::workspace(2)).unwrap().mask(),
        1
    );
}

#[test]
fn import_overwrite_invalidates_descendants_of_replaced_rows() {
    let (engine, _) = engine();

    engine
        .grant(
            Resource::workspace(2),
            Principal::User(7),
            Permission::contributor(),
            true,
        )
        .unwrap();
    assert_eq!(
        engine.check_permission(7, Resource::project(20)).unwrap().mask(),
        7
    );

    let incoming = r#"[{
        "resource_type": "workspace",
        "resource_id": 2,
        "principal": { "kind": "user", "id": 7 },
        "access_type": "allow",
        "permissions": 1,
        "inherit_to_children": false
    }]"#;
    let report = engine
        .import(incoming, TransferFormat::Json, ImportMode::Overwrite)
        .unwrap();
    assert_eq!(report.imported, 1);

    // The overwritten row was inheriting; the project resolution must be
    // recomputed, not served from cache.
    assert_eq!(
        engine.check_permission(7, Resource::project(20)).unwrap().mask(),
        0
    );
}

#[test]
fn effective_is_allow_and_not_deny_over_random_entry_sets() {
    let mut rng = rand::rng();
    let user = Principal::User(7);
    let resource = Resource::workspace(1);

    for _ in 0..200 {
        let (engine, _) = engine();
        let mut allow = Permission::empty();
        let mut deny = Permission::empty();

        // Random pile of allow/deny entries across user and group, workspace
        // and root, all applicable to the target.
        for _ in 0..rng.random_range(1..8) {
            let permissions =
                Permission::from_mask(rng.random_range(0..32)).unwrap();
            let principal = if rng.random_bool(0.5) {
                user
            } else {
                Principal::Group(50)
            };
            let at_ancestor = rng.random_bool(0.3);
            let target = if at_ancestor { Resource::root() } else { resource };
            if rng.random_bool(0.5) {
                engine.grant(target, principal, permissions, at_ancestor).unwrap();
            } else {
                engine.deny(target, principal, permissions, at_ancestor).unwrap();
            }
        }

        // Recompute expected masks from the raw stored rows.
        for entry in engine.store.all_entries().unwrap() {
            match entry.access_type {
                AccessType::Allow => allow |= entry.permissions,
                AccessType::Deny => deny |= entry.permissions,
            }
        }

        let effective = engine.check_permission(7, resource).unwrap();
        assert_eq!(effective, allow & !deny);
    }
}
