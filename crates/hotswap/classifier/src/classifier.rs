//! Change classification.
//!
//! Decides whether a [`ProposedChange`] needs human sign-off and at which
//! [`ApprovalLevel`]. Classification is pure: the same inputs always give
//! the same answer and nothing is recorded, so it is safe for dry runs.

use crate::compatibility::{check_compatibility, CompatibilityMode};
use hotswap_types::{
    ApprovalDetails, ApprovalLevel, BreakingChange, BreakingChangeKind, ChangeBody,
    ProposedChange, RiskTier, SchemaDefinition,
};
use serde::{Deserialize, Serialize};

/// Number of breaking changes from which a schema change is critical.
const CRITICAL_CHANGE_COUNT: usize = 5;

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The change may proceed without sign-off.
    NoApprovalNeeded { reason: String },
    /// The change needs a decision at the given level.
    ApprovalRequired(ApprovalDetails),
}

impl Classification {
    pub fn requires_approval(&self) -> bool {
        matches!(self, Self::ApprovalRequired(_))
    }

    pub fn level(&self) -> Option<ApprovalLevel> {
        match self {
            Self::NoApprovalNeeded { .. } => None,
            Self::ApprovalRequired(details) => Some(details.level),
        }
    }
}

/// Classification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierPolicy {
    /// Schema compatibility mode
    #[serde(default)]
    pub compatibility: CompatibilityMode,

    /// Declared risk tiers at or above this need approval
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: RiskTier,
}

fn default_risk_threshold() -> RiskTier {
    RiskTier::High
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityMode::default(),
            risk_threshold: default_risk_threshold(),
        }
    }
}

/// Classifies proposed changes against their baseline.
#[derive(Debug, Clone, Default)]
pub struct ChangeClassifier {
    policy: ClassifierPolicy,
}

impl ChangeClassifier {
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ClassifierPolicy {
        &self.policy
    }

    /// Classify `change`.
    ///
    /// `prior` is the subject's current schema; `None` means the change
    /// introduces the first version. It is ignored for risk-tier changes.
    pub fn classify(
        &self,
        change: &ProposedChange,
        prior: Option<&SchemaDefinition>,
    ) -> Classification {
        match &change.body {
            ChangeBody::Schema { candidate } => self.classify_schema(change, prior, candidate),
            ChangeBody::Risk { tier } => self.classify_risk(*tier),
        }
    }

    fn classify_schema(
        &self,
        change: &ProposedChange,
        prior: Option<&SchemaDefinition>,
        candidate: &SchemaDefinition,
    ) -> Classification {
        let Some(prior) = prior else {
            return Classification::NoApprovalNeeded {
                reason: format!("first version {} of {}", candidate.version, change.subject_id),
            };
        };

        let verdict = check_compatibility(
            &change.subject_id,
            Some(prior),
            candidate,
            self.policy.compatibility,
        );

        if verdict.compatible {
            return Classification::NoApprovalNeeded {
                reason: format!(
                    "{} is compatible with {}",
                    candidate.version, prior.version
                ),
            };
        }

        let level = schema_level(prior, &verdict.breaking_changes);
        Classification::ApprovalRequired(ApprovalDetails {
            level,
            reason: format!(
                "{} breaking change(s) between {} and {}",
                verdict.breaking_changes.len(),
                prior.version,
                candidate.version
            ),
            breaking_changes: verdict.breaking_changes,
        })
    }

    fn classify_risk(&self, tier: RiskTier) -> Classification {
        if tier < self.policy.risk_threshold {
            return Classification::NoApprovalNeeded {
                reason: format!(
                    "declared risk {} is below threshold {}",
                    tier, self.policy.risk_threshold
                ),
            };
        }

        let level = match tier {
            RiskTier::Critical => ApprovalLevel::Critical,
            RiskTier::High => ApprovalLevel::Elevated,
            RiskTier::Low | RiskTier::Medium => ApprovalLevel::Standard,
        };

        Classification::ApprovalRequired(ApprovalDetails {
            level,
            reason: format!("declared risk {}", tier),
            breaking_changes: Vec::new(),
        })
    }
}

fn schema_level(prior: &SchemaDefinition, changes: &[BreakingChange]) -> ApprovalLevel {
    let retypes_required_field = changes.iter().any(|change| {
        matches!(change.kind, BreakingChangeKind::FieldTypeChanged { .. })
            && change
                .field
                .as_deref()
                .and_then(|name| prior.field(name))
                .is_some_and(|field| field.required)
    });

    if retypes_required_field || changes.len() >= CRITICAL_CHANGE_COUNT {
        ApprovalLevel::Critical
    } else if changes.len() >= 2 {
        ApprovalLevel::Elevated
    } else {
        ApprovalLevel::Standard
    }
}
