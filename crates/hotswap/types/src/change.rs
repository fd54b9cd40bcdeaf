//! Proposed changes submitted for governance

use crate::{SchemaDefinition, SubjectId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of entity a change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A schema version registered for a subject
    Schema,
    /// A software module hot-swapped across the fleet
    Module,
    /// A data migration
    Migration,
}

/// Declared risk of a non-schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// The part of a change the classifier inspects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeBody {
    /// Candidate schema, compared against the subject's prior schema
    Schema { candidate: SchemaDefinition },
    /// Declared risk tier, compared against the policy threshold
    Risk { tier: RiskTier },
}

/// A change proposed for a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedChange {
    /// Subject under governance
    pub subject_id: SubjectId,

    /// Kind of subject
    pub kind: SubjectKind,

    /// Version the change would install
    pub candidate_version: semver::Version,

    /// Classifier input
    pub body: ChangeBody,

    /// Short human-readable description
    #[serde(default)]
    pub description: String,

    /// Opaque payload handed to the pipeline executor
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ProposedChange {
    /// A schema change; the candidate version is taken from the schema
    pub fn schema(subject_id: impl Into<SubjectId>, candidate: SchemaDefinition) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind: SubjectKind::Schema,
            candidate_version: candidate.version.clone(),
            body: ChangeBody::Schema { candidate },
            description: String::new(),
            payload: serde_json::Value::Null,
        }
    }

    /// A module or migration change with a declared risk tier
    pub fn with_risk(
        subject_id: impl Into<SubjectId>,
        kind: SubjectKind,
        candidate_version: semver::Version,
        tier: RiskTier,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
            candidate_version,
            body: ChangeBody::Risk { tier },
            description: String::new(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
