// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture collaborators for driving the engine without a real catalog,
//! identity store or audit sink.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::traits::{AuditEvent, AuditRecorder, GroupMembership, ResourceCatalog};

#[derive(Debug, Error)]
pub enum TestCollaboratorError {
    #[error("collaborator unavailable")]
    Unavailable,
}

/// Resource catalog fixture: a flat description of the workspace, project and
/// feature tree.
#[derive(Clone, Debug, Default)]
pub struct TestCatalog {
    workspaces: HashSet<u64>,
    projects: HashMap<u64, u64>,
    features: HashMap<u64, u64>,
    unavailable: bool,
}

impl TestCatalog {
    pub fn with_workspace(mut self, workspace_id: u64) -> Self {
        self.workspaces.insert(workspace_id);
        self
    }

    pub fn with_project(mut self, project_id: u64, workspace_id: u64) -> Self {
        self.workspaces.insert(workspace_id);
        self.projects.insert(project_id, workspace_id);
        self
    }

    pub fn with_feature(mut self, feature_id: u64, project_id: u64) -> Self {
        self.features.insert(feature_id, project_id);
        self
    }

    /// Make every lookup fail, simulating a catalog outage.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self) -> Result<(), TestCollaboratorError> {
        if self.unavailable {
            Err(TestCollaboratorError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl ResourceCatalog for TestCatalog {
    type Error = TestCollaboratorError;

    fn workspace_exists(&self, workspace_id: u64) -> Result<bool, Self::Error> {
        self.check()?;
        Ok(self.workspaces.contains(&workspace_id))
    }

    fn project_workspace(&self, project_id: u64) -> Result<Option<u64>, Self::Error> {
        self.check()?;
        Ok(self.projects.get(&project_id).copied())
    }

    fn feature_project(&self, feature_id: u64) -> Result<Option<u64>, Self::Error> {
        self.check()?;
        Ok(self.features.get(&feature_id).copied())
    }
}

/// Identity and membership fixture with flat user/group relations.
#[derive(Clone, Debug, Default)]
pub struct TestMembership {
    users: HashSet<u64>,
    groups: HashSet<u64>,
    members: HashMap<u64, Vec<u64>>,
    security_groups: HashSet<u64>,
    protected_groups: HashSet<u64>,
}

impl TestMembership {
    pub fn with_user(mut self, user_id: u64) -> Self {
        self.users.insert(user_id);
        self
    }

    pub fn with_group(mut self, group_id: u64) -> Self {
        self.groups.insert(group_id);
        self
    }

    pub fn with_member(mut self, user_id: u64, group_id: u64) -> Self {
        self.users.insert(user_id);
        self.groups.insert(group_id);
        self.members.entry(user_id).or_default().push(group_id);
        self
    }

    pub fn with_security_group(mut self, group_id: u64) -> Self {
        self.groups.insert(group_id);
        self.security_groups.insert(group_id);
        self
    }

    pub fn with_protected_group(mut self, group_id: u64) -> Self {
        self.groups.insert(group_id);
        self.protected_groups.insert(group_id);
        self
    }
}

impl GroupMembership for TestMembership {
    type Error = TestCollaboratorError;

    fn user_exists(&self, user_id: u64) -> Result<bool, Self::Error> {
        Ok(self.users.contains(&user_id))
    }

    fn group_exists(&self, group_id: u64) -> Result<bool, Self::Error> {
        Ok(self.groups.contains(&group_id))
    }

    fn groups_for(&self, user_id: u64) -> Result<Vec<u64>, Self::Error> {
        Ok(self.members.get(&user_id).cloned().unwrap_or_default())
    }

    fn is_security_group(&self, group_id: u64) -> Result<bool, Self::Error> {
        Ok(self.security_groups.contains(&group_id))
    }

    fn is_protected_group(&self, group_id: u64) -> Result<bool, Self::Error> {
        Ok(self.protected_groups.contains(&group_id))
    }
}

/// Audit sink fixture which keeps every event for later inspection.
#[derive(Clone, Debug, Default)]
pub struct TestAudit {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl TestAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl AuditRecorder for TestAudit {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
