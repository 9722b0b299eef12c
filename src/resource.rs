// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::AclError;
use crate::traits::ResourceCatalog;

/// Every scope a permission can be granted on.
///
/// `Workspace`, `Project` and `Feature` are structural: their parent is
/// resolved through the resource catalog. The remaining types are root-level
/// singleton scopes with root as their only ancestor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Root,
    System,
    Dashboard,
    Workspace,
    Project,
    Feature,
    Admin,
    Profile,
}

impl ResourceType {
    pub fn parse(name: &str) -> Result<Self, AclError> {
        match name {
            "root" => Ok(ResourceType::Root),
            "system" => Ok(ResourceType::System),
            "dashboard" => Ok(ResourceType::Dashboard),
            "workspace" => Ok(ResourceType::Workspace),
            "project" => Ok(ResourceType::Project),
            "feature" => Ok(ResourceType::Feature),
            "admin" => Ok(ResourceType::Admin),
            "profile" => Ok(ResourceType::Profile),
            other => Err(AclError::UnknownResourceType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Root => "root",
            ResourceType::System => "system",
            ResourceType::Dashboard => "dashboard",
            ResourceType::Workspace => "workspace",
            ResourceType::Project => "project",
            ResourceType::Feature => "feature",
            ResourceType::Admin => "admin",
            ResourceType::Profile => "profile",
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete resource a permission applies to.
///
/// `resource_id` is `None` exactly when `resource_type` is [`ResourceType::Root`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: ResourceType,
    pub resource_id: Option<u64>,
}

impl Resource {
    /// Construct a resource, validating the type/id combination.
    pub fn new(resource_type: ResourceType, resource_id: Option<u64>) -> Result<Self, AclError> {
        match (resource_type, resource_id) {
            (ResourceType::Root, None) => Ok(Resource {
                resource_type,
                resource_id,
            }),
            (ResourceType::Root, Some(_)) => Err(AclError::UnexpectedResourceId(resource_type)),
            (_, None) => Err(AclError::MissingResourceId(resource_type)),
            (_, Some(_)) => Ok(Resource {
                resource_type,
                resource_id,
            }),
        }
    }

    pub fn root() -> Self {
        Resource {
            resource_type: ResourceType::Root,
            resource_id: None,
        }
    }

    pub fn system(id: u64) -> Self {
        Resource {
            resource_type: ResourceType::System,
            resource_id: Some(id),
        }
    }

    pub fn dashboard(id: u64) -> Self {
        Resource {
            resource_type: ResourceType::Dashboard,
            resource_id: Some(id),
        }
    }

    pub fn workspace(id: u64) -> Self {
        Resource {
            resource_type: ResourceType::Workspace,
            resource_id: Some(id),
        }
    }

    pub fn project(id: u64) -> Self {
        Resource {
            resource_type: ResourceType::Project,
            resource_id: Some(id),
        }
    }

    pub fn feature(id: u64) -> Self {
        Resource {
            resource_type: ResourceType::Feature,
            resource_id: Some(id),
        }
    }

    pub fn admin(id: u64) -> Self {
        Resource {
            resource_type: ResourceType::Admin,
            resource_id: Some(id),
        }
    }

    pub fn profile(id: u64) -> Self {
        Resource {
            resource_type: ResourceType::Profile,
            resource_id: Some(id),
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.resource_id {
            Some(id) => write!(f, "{}:{}", self.resource_type, id),
            None => write!(f, "{}", self.resource_type),
        }
    }
}

/// Resolve the ordered ancestor chain of a resource, nearest first.
///
/// The chain always starts with the resource itself and terminates at root.
/// Only structural types consult the catalog; singleton scopes resolve
/// directly to `[self, root]`. A workspace or project id missing from the
/// catalog yields [`AclError::ResourceNotFound`]; evaluation callers treat
/// that as "no access", administrative callers surface it.
pub fn ancestors<C: ResourceCatalog>(
    catalog: &C,
    resource: Resource,
) -> Result<Vec<Resource>, AclError> {
    let collaborator = |error: C::Error| AclError::Collaborator(error.to_string());

    let chain = match (resource.resource_type, resource.resource_id) {
        (ResourceType::Root, _) => vec![Resource::root()],
        (
            ResourceType::System | ResourceType::Dashboard | ResourceType::Admin
            | ResourceType::Profile,
            _,
        ) => {
            vec![resource, Resource::root()]
        }
        (ResourceType::Workspace, Some(workspace_id)) => {
            if !catalog.workspace_exists(workspace_id).map_err(collaborator)? {
                return Err(AclError::ResourceNotFound(resource));
            }
            vec![resource, Resource::root()]
        }
        (ResourceType::Project, Some(project_id)) => {
            let workspace_id = catalog
                .project_workspace(project_id)
                .map_err(collaborator)?
                .ok_or(AclError::ResourceNotFound(resource))?;
            vec![resource, Resource::workspace(workspace_id), Resource::root()]
        }
        (ResourceType::Feature, Some(feature_id)) => {
            let project_id = catalog
                .feature_project(feature_id)
                .map_err(collaborator)?
                .ok_or(AclError::ResourceNotFound(resource))?;
            let workspace_id = catalog
                .project_workspace(project_id)
                .map_err(collaborator)?
                .ok_or_else(|| AclError::ResourceNotFound(Resource::project(project_id)))?;
            vec![
                resource,
                Resource::project(project_id),
                Resource::workspace(workspace_id),
                Resource::root(),
            ]
        }
        // Resource::new rejects structural resources without an id; raw
        // construction can still produce one, treat it as unresolvable.
        (_, None) => return Err(AclError::MissingResourceId(resource.resource_type)),
    };

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::{Resource, ResourceType, ancestors};
    use crate::error::AclError;
    use crate::test_utils::TestCatalog;

    #[test]
    fn root_only_resource_without_id() {
        assert!(Resource::new(ResourceType::Root, None).is_ok());
        assert!(matches!(
            Resource::new(ResourceType::Root, Some(1)),
            Err(AclError::UnexpectedResourceId(_))
        ));
        assert!(matches!(
            Resource::new(ResourceType::Project, None),
            Err(AclError::MissingResourceId(_))
        ));
    }

    #[test]
    fn feature_chain_runs_to_root() {
        let catalog = TestCatalog::default()
            .with_workspace(1)
            .with_project(10, 1)
            .with_feature(100, 10);

        let chain = ancestors(&catalog, Resource::feature(100)).unwrap();
        assert_eq!(
            chain,
            vec![
                Resource::feature(100),
                Resource::project(10),
                Resource::workspace(1),
                Resource::root(),
            ]
        );
    }

    #[test]
    fn singleton_scopes_resolve_to_self_and_root() {
        let catalog = TestCatalog::default();
        let chain = ancestors(&catalog, Resource::admin(1)).unwrap();
        assert_eq!(chain, vec![Resource::admin(1), Resource::root()]);

        let chain = ancestors(&catalog, Resource::dashboard(3)).unwrap();
        assert_eq!(chain, vec![Resource::dashboard(3), Resource::root()]);
    }

    #[test]
    fn unknown_project_is_not_found() {
        let catalog = TestCatalog::default().with_workspace(1);
        let result = ancestors(&catalog, Resource::project(99));
        assert!(matches!(result, Err(AclError::ResourceNotFound(_))));
    }

    #[test]
    fn unknown_workspace_is_not_found() {
        let catalog = TestCatalog::default();
        let result = ancestors(&catalog, Resource::workspace(42));
        assert!(matches!(result, Err(AclError::ResourceNotFound(_))));
    }
}
