// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use bitflags::bitflags;

use crate::error::AclError;

bitflags! {
    /// The five permission bits which can be granted or denied on a resource.
    ///
    /// Effective permissions are always computed as `allow & !deny`: a denied
    /// bit is removed no matter how many allow sources contribute it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct Permission: u32 {
        const READ = 1;
        const WRITE = 2;
        const EXECUTE = 4;
        const DELETE = 8;
        const MANAGE_PERMISSIONS = 16;
    }
}

impl Permission {
    /// Read-only preset (mask 1).
    pub fn read_only() -> Self {
        Permission::READ
    }

    /// Contributor preset (mask 7).
    pub fn contributor() -> Self {
        Permission::READ | Permission::WRITE | Permission::EXECUTE
    }

    /// Editor preset (mask 15).
    pub fn editor() -> Self {
        Permission::READ | Permission::WRITE | Permission::EXECUTE | Permission::DELETE
    }

    /// Full-control preset (mask 31).
    pub fn full_control() -> Self {
        Permission::all()
    }

    /// Validate a raw mask and convert it into a permission set.
    ///
    /// Anything above 31 carries bits with no defined meaning and is rejected
    /// before it can reach a store.
    pub fn from_mask(mask: u32) -> Result<Self, AclError> {
        Permission::from_bits(mask).ok_or(AclError::InvalidMask(mask))
    }

    /// The raw bitmask value.
    pub fn mask(&self) -> u32 {
        self.bits()
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<_> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join("|").to_lowercase())
    }
}

/// Serialize a [`Permission`] as its raw mask so wire formats carry plain
/// integers (1, 7, 15, 31) rather than flag names.
pub(crate) mod mask_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Permission;

    pub fn serialize<S: Serializer>(value: &Permission, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(value.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Permission, D::Error> {
        let mask = u32::deserialize(deserializer)?;
        Permission::from_bits(mask)
            .ok_or_else(|| D::Error::custom(format!("permission mask {mask} outside [0,31]")))
    }
}

/// The named template presets available for bulk application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Template {
    ReadOnly,
    Contributor,
    Editor,
    FullControl,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::ReadOnly,
        Template::Contributor,
        Template::Editor,
        Template::FullControl,
    ];

    /// Resolve a template name as used on the wire.
    pub fn parse(name: &str) -> Result<Self, AclError> {
        Template::ALL
            .into_iter()
            .find(|template| template.as_str() == name)
            .ok_or_else(|| AclError::UnknownTemplate(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Template::ReadOnly => "read_only",
            Template::Contributor => "contributor",
            Template::Editor => "editor",
            Template::FullControl => "full_control",
        }
    }

    /// The fixed permission set this template stands for.
    pub fn permissions(&self) -> Permission {
        match self {
            Template::ReadOnly => Permission::read_only(),
            Template::Contributor => Permission::contributor(),
            Template::Editor => Permission::editor(),
            Template::FullControl => Permission::full_control(),
        }
    }
}
