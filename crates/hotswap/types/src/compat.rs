//! Schema definitions and compatibility verdicts
//!
//! A schema subject evolves through versions. The classifier compares a
//! candidate [`SchemaDefinition`] with its baseline and reports every
//! [`BreakingChange`] it finds in a [`CompatibilityVerdict`].

use crate::SubjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field type in a schema definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Bytes,
    Timestamp,
    List(Box<FieldType>),
    Object(String),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Bytes => write!(f, "bytes"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::List(inner) => write!(f, "list<{}>", inner),
            Self::Object(name) => write!(f, "object<{}>", name),
        }
    }
}

/// A single field of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field type
    pub ty: FieldType,

    /// Whether readers require the field to be present
    #[serde(default)]
    pub required: bool,

    /// Default used when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FieldDef {
    /// An optional field without default
    pub fn optional(ty: FieldType) -> Self {
        Self {
            ty,
            required: false,
            default: None,
        }
    }

    /// A required field without default
    pub fn required(ty: FieldType) -> Self {
        Self {
            ty,
            required: true,
            default: None,
        }
    }

    /// Attach a default value
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A versioned schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Schema version
    pub version: semver::Version,

    /// Fields keyed by name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
}

impl SchemaDefinition {
    pub fn new(version: semver::Version) -> Self {
        Self {
            version,
            fields: BTreeMap::new(),
        }
    }

    /// Add or replace a field
    pub fn with_field(mut self, name: impl Into<String>, field: FieldDef) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }
}

/// Kind of breaking change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakingChangeKind {
    /// A field existing consumers rely on was removed
    FieldRemoved,
    /// A field changed type
    FieldTypeChanged { from: FieldType, to: FieldType },
    /// A new required field has no default
    RequiredFieldAdded,
    /// An optional field became required without a default
    FieldMadeRequired,
    /// The candidate version does not advance past the baseline
    VersionNotIncreasing,
}

/// A modification that would cause at least one existing consumer to fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    /// Kind of change
    pub kind: BreakingChangeKind,

    /// Affected field, if the change is field-level
    pub field: Option<String>,

    /// Human-readable description shown to reviewers
    pub description: String,
}

impl BreakingChange {
    pub fn field(kind: BreakingChangeKind, field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            field: Some(field.into()),
            description: description.into(),
        }
    }

    pub fn schema(kind: BreakingChangeKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            description: description.into(),
        }
    }
}

impl fmt::Display for BreakingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.description),
            None => write!(f, "{}", self.description),
        }
    }
}

/// Result of comparing a candidate schema against its baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityVerdict {
    /// Subject being evolved
    pub subject_id: SubjectId,

    /// Candidate version
    pub candidate_version: semver::Version,

    /// Breaking changes relative to the baseline
    pub breaking_changes: Vec<BreakingChange>,

    /// True when `breaking_changes` is empty
    pub compatible: bool,
}

impl CompatibilityVerdict {
    /// Build a verdict; compatibility is derived from the change list
    pub fn new(
        subject_id: SubjectId,
        candidate_version: semver::Version,
        breaking_changes: Vec<BreakingChange>,
    ) -> Self {
        let compatible = breaking_changes.is_empty();
        Self {
            subject_id,
            candidate_version,
            breaking_changes,
            compatible,
        }
    }
}
