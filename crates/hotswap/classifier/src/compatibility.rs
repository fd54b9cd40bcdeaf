//! Schema compatibility checking.
//!
//! Compares a candidate [`SchemaDefinition`] with the subject's prior one.
//! Which differences count as breaking depends on the [`CompatibilityMode`].

use hotswap_types::{
    BreakingChange, BreakingChangeKind, CompatibilityVerdict, SchemaDefinition, SubjectId,
};
use serde::{Deserialize, Serialize};

/// Which consumers a schema evolution must keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityMode {
    /// Readers on the candidate must read data written with the prior schema.
    Backward,
    /// Readers on the prior schema must read data written with the candidate.
    Forward,
    /// Both directions.
    #[default]
    Full,
    /// Nothing is ever breaking.
    None,
}

impl CompatibilityMode {
    fn checks_backward(&self) -> bool {
        matches!(self, Self::Backward | Self::Full)
    }

    fn checks_forward(&self) -> bool {
        matches!(self, Self::Forward | Self::Full)
    }
}

/// Compare `candidate` against `prior`.
///
/// A missing `prior` means the candidate is the first version of the
/// subject, which is always compatible.
pub fn check_compatibility(
    subject_id: &SubjectId,
    prior: Option<&SchemaDefinition>,
    candidate: &SchemaDefinition,
    mode: CompatibilityMode,
) -> CompatibilityVerdict {
    let changes = match prior {
        Some(prior) if mode != CompatibilityMode::None => breaking_changes(prior, candidate, mode),
        _ => Vec::new(),
    };

    CompatibilityVerdict::new(subject_id.clone(), candidate.version.clone(), changes)
}

fn breaking_changes(
    prior: &SchemaDefinition,
    candidate: &SchemaDefinition,
    mode: CompatibilityMode,
) -> Vec<BreakingChange> {
    let mut changes = Vec::new();

    if candidate.version <= prior.version {
        changes.push(BreakingChange::schema(
            BreakingChangeKind::VersionNotIncreasing,
            format!(
                "candidate version {} does not advance past {}",
                candidate.version, prior.version
            ),
        ));
    }

    // Fields present in both: type and requiredness.
    for (name, old) in &prior.fields {
        let Some(new) = candidate.fields.get(name) else {
            if mode.checks_forward() && old.required && !old.has_default() {
                changes.push(BreakingChange::field(
                    BreakingChangeKind::FieldRemoved,
                    name,
                    "required field removed; existing readers will fail",
                ));
            }
            continue;
        };

        if old.ty != new.ty {
            changes.push(BreakingChange::field(
                BreakingChangeKind::FieldTypeChanged {
                    from: old.ty.clone(),
                    to: new.ty.clone(),
                },
                name,
                format!("type changed from {} to {}", old.ty, new.ty),
            ));
        } else if mode.checks_backward() && !old.required && new.required && !new.has_default() {
            changes.push(BreakingChange::field(
                BreakingChangeKind::FieldMadeRequired,
                name,
                "optional field made required without a default",
            ));
        }
    }

    if mode.checks_backward() {
        for (name, new) in &candidate.fields {
            if prior.fields.contains_key(name) {
                continue;
            }
            if new.required && !new.has_default() {
                changes.push(BreakingChange::field(
                    BreakingChangeKind::RequiredFieldAdded,
                    name,
                    "required field added without a default",
                ));
            }
        }
    }

    changes
}
