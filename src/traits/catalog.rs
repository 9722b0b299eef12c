// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

/// Interface to the external resource catalog.
///
/// The engine never stores the workspace/project/feature tree itself; the
/// parent chain is a pure function of resource type plus these lookups. All
/// methods are read-only and should be fast, retryable reads; a failure here
/// degrades evaluation to "no access" rather than surfacing to the caller.
pub trait ResourceCatalog {
    type Error: Error;

    /// Return `true` if the workspace exists.
    fn workspace_exists(&self, workspace_id: u64) -> Result<bool, Self::Error>;

    /// Return the workspace a project belongs to, or `None` if the project is
    /// unknown.
    fn project_workspace(&self, project_id: u64) -> Result<Option<u64>, Self::Error>;

    /// Return the project a feature belongs to, or `None` if the feature is
    /// unknown.
    fn feature_project(&self, feature_id: u64) -> Result<Option<u64>, Self::Error>;
}
