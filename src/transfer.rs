// SPDX-License-Identifier: MIT OR Apache-2.0

//! Export and import of the stored entry set.
//!
//! A JSON or CSV export round-trips through import into an equivalent entry
//! set: equal on `(resource, principal, access type, permissions,
//! inheritance)`, with fresh row ids and timestamps.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{AclEngine, store_error};
use crate::entry::{AccessType, AclEntry, EntryKey};
use crate::error::AclError;
use crate::permission::Permission;
use crate::principal::Principal;
use crate::resource::{Resource, ResourceType};
use crate::traits::{AclStore, AuditOperation, AuditRecorder, GroupMembership, ResourceCatalog, RoleStore};

/// Serialization format for export and import.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferFormat {
    Json,
    Csv,
}

impl TransferFormat {
    pub fn parse(name: &str) -> Result<Self, AclError> {
        match name {
            "json" => Ok(TransferFormat::Json),
            "csv" => Ok(TransferFormat::Csv),
            other => Err(AclError::UnknownFormat(other.to_string())),
        }
    }
}

/// How import treats records whose logical key already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMode {
    /// Leave existing entries untouched, insert only new keys.
    Skip,
    /// Replace existing entries with the imported record.
    Overwrite,
    /// Union the permission masks and widen inheritance.
    Merge,
}

/// Filter applied when exporting.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntryFilter {
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<u64>,
    pub principal: Option<Principal>,
    pub access_type: Option<AccessType>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &AclEntry) -> bool {
        if let Some(resource_type) = self.resource_type
            && entry.resource.resource_type != resource_type
        {
            return false;
        }
        if let Some(resource_id) = self.resource_id
            && entry.resource.resource_id != Some(resource_id)
        {
            return false;
        }
        if let Some(principal) = self.principal
            && entry.principal != principal
        {
            return false;
        }
        if let Some(access_type) = self.access_type
            && entry.access_type != access_type
        {
            return false;
        }
        true
    }
}

/// One entry on the wire. Row id and creation time are deliberately absent:
/// they are store metadata, not part of the logical entry set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub resource_type: ResourceType,
    pub resource_id: Option<u64>,
    pub principal: Principal,
    pub access_type: AccessType,
    pub permissions: u32,
    pub inherit_to_children: bool,
}

impl EntryRecord {
    pub(crate) fn resource(&self) -> Result<Resource, AclError> {
        Resource::new(self.resource_type, self.resource_id)
    }
}

impl From<&AclEntry> for EntryRecord {
    fn from(entry: &AclEntry) -> Self {
        EntryRecord {
            resource_type: entry.resource.resource_type,
            resource_id: entry.resource.resource_id,
            principal: entry.principal,
            access_type: entry.access_type,
            permissions: entry.permissions.mask(),
            inherit_to_children: entry.inherit_to_children,
        }
    }
}

const CSV_HEADER: &str =
    "resource_type,resource_id,principal_kind,principal_id,access_type,permissions,inherit_to_children";

/// Serialize records in the requested format. All CSV columns are numeric or
/// closed enum names, so no quoting or escaping is involved.
pub fn serialize_records(
    records: &[EntryRecord],
    format: TransferFormat,
) -> Result<String, AclError> {
    match format {
        TransferFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        TransferFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push('\n');
            for record in records {
                let (kind, id) = match record.principal {
                    Principal::User(id) => ("user", id),
                    Principal::Group(id) => ("group", id),
                };
                let resource_id = record
                    .resource_id
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                out.push_str(&format!(
                    "{},{},{},{},{},{},{}\n",
                    record.resource_type.as_str(),
                    resource_id,
                    kind,
                    id,
                    match record.access_type {
                        AccessType::Allow => "allow",
                        AccessType::Deny => "deny",
                    },
                    record.permissions,
                    record.inherit_to_children,
                ));
            }
            Ok(out)
        }
    }
}

/// Parse records in the requested format. Malformed data is rejected as a
/// whole before any store access.
pub fn parse_records(data: &str, format: TransferFormat) -> Result<Vec<EntryRecord>, AclError> {
    match format {
        TransferFormat::Json => Ok(serde_json::from_str(data)?),
        TransferFormat::Csv => {
            let mut records = Vec::new();
            let mut lines = data.lines();
            match lines.next() {
                Some(header) if header.trim() == CSV_HEADER => {}
                _ => {
                    return Err(AclError::MalformedImport(
                        "missing or unexpected csv header".to_string(),
                    ));
                }
            }
            for (line_no, line) in lines.enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                records.push(parse_csv_line(line).map_err(|reason| {
                    AclError::MalformedImport(format!("line {}: {reason}", line_no + 2))
                })?);
            }
            Ok(records)
        }
    }
}

fn parse_csv_line(line: &str) -> Result<EntryRecord, String> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 7 {
        return Err(format!("expected 7 fields, got {}", fields.len()));
    }

    let resource_type = ResourceType::parse(fields[0]).map_err(|error| error.to_string())?;
    let resource_id = if fields[1].is_empty() {
        None
    } else {
        Some(
            fields[1]
                .parse::<u64>()
                .map_err(|_| format!("invalid resource id \"{}\"", fields[1]))?,
        )
    };
    let principal_id = fields[3]
        .parse::<u64>()
        .map_err(|_| format!("invalid principal id \"{}\"", fields[3]))?;
    let principal = match fields[2] {
        "user" => Principal::User(principal_id),
        "group" => Principal::Group(principal_id),
        other => return Err(format!("unknown principal kind \"{other}\"")),
    };
    let access_type = match fields[4] {
        "allow" => AccessType::Allow,
        "deny" => AccessType::Deny,
        other => return Err(format!("unknown access type \"{other}\"")),
    };
    let permissions = fields[5]
        .parse::<u32>()
        .map_err(|_| format!("invalid permission mask \"{}\"", fields[5]))?;
    let inherit_to_children = match fields[6] {
        "true" => true,
        "false" => false,
        other => return Err(format!("invalid inheritance flag \"{other}\"")),
    };

    Ok(EntryRecord {
        resource_type,
        resource_id,
        principal,
        access_type,
        permissions,
        inherit_to_children,
    })
}

/// Aggregate result of an import. Per-record failures are collected, never
/// thrown; one bad record does not block the rest.
#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub merged: usize,
    pub failed: usize,
    pub failures: Vec<String>,
}

impl<S, C, M, A> AclEngine<S, C, M, A>
where
    S: AclStore + RoleStore,
    C: ResourceCatalog,
    M: GroupMembership,
    A: AuditRecorder,
{
    /// Serialize the stored entry set, optionally filtered.
    pub fn export(&self, format: TransferFormat, filter: &EntryFilter) -> Result<String, AclError> {
        let entries = self.store.all_entries().map_err(store_error)?;
        let records: Vec<EntryRecord> = entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .map(EntryRecord::from)
            .collect();
        serialize_records(&records, format)
    }

    /// Import serialized records into the store.
    ///
    /// Parsing and mask validation happen before any store access. Per-record
    /// application is independently transactional: resource or principal
    /// lookups failing for one record leave the others untouched.
    pub fn import(
        &self,
        data: &str,
        format: TransferFormat,
        mode: ImportMode,
    ) -> Result<ImportReport, AclError> {
        let records = parse_records(data, format)?;
        for record in &records {
            // Reject out-of-range masks up front, before anything applies.
            Permission::from_mask(record.permissions)?;
        }

        let mut report = ImportReport::default();
        for record in records {
            match self.import_one(&record, mode) {
                Ok(Applied::Imported) => report.imported += 1,
                Ok(Applied::Skipped) => report.skipped += 1,
                Ok(Applied::Merged) => report.merged += 1,
                Err(error) => {
                    warn!(%error, "import record failed");
                    report.failed += 1;
                    report.failures.push(error.to_string());
                }
            }
        }
        Ok(report)
    }

    fn import_one(&self, record: &EntryRecord, mode: ImportMode) -> Result<Applied, AclError> {
        let resource = record.resource()?;
        let permissions = Permission::from_mask(record.permissions)?;
        self.require_resource(resource)?;
        self.require_principal(record.principal)?;

        let key = EntryKey {
            resource,
            principal: record.principal,
            access_type: record.access_type,
        };
        let existing = self
            .store
            .entries_for(&[resource], &[record.principal])
            .map_err(store_error)?
            .into_iter()
            .find(|entry| entry.key() == key);

        let (permissions, inherit, applied) = match (&existing, mode) {
            (Some(_), ImportMode::Skip) => return Ok(Applied::Skipped),
            (Some(current), ImportMode::Merge) => (
                permissions | current.permissions,
                record.inherit_to_children || current.inherit_to_children,
                Applied::Merged,
            ),
            _ => (permissions, record.inherit_to_children, Applied::Imported),
        };

        // An overwritten inheriting row has cached resolutions at descendant
        // resources; invalidation must cover it, not just the imported flag.
        let replaced_inherits = existing
            .as_ref()
            .is_some_and(|entry| entry.inherit_to_children);

        let before = self.snapshot(record.principal, resource)?;
        self.store
            .upsert(
                resource,
                record.principal,
                permissions,
                record.access_type,
                inherit,
            )
            .map_err(store_error)?;
        self.cache
            .invalidate_entry(resource, record.principal, inherit || replaced_inherits);
        let after = self.snapshot(record.principal, resource)?;
        self.emit_audit(
            AuditOperation::Import,
            resource,
            record.principal,
            before,
            after,
        );

        Ok(applied)
    }
}

enum Applied {
    Imported,
    Skipped,
    Merged,
}
