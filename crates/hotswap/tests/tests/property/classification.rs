//! Property tests: classification of schema and risk changes.
//!
//! - A subject's first version never needs sign-off.
//! - Any breaking change requires approval, and more breaking changes never
//!   lower the required level.
//! - Declared risk below the policy threshold never needs sign-off.

use hotswap_classifier::{ChangeClassifier, Classification, ClassifierPolicy, CompatibilityMode};
use hotswap_types::{
    ApprovalLevel, FieldDef, FieldType, ProposedChange, RiskTier, SchemaDefinition, SubjectKind,
};
use proptest::prelude::*;
use semver::Version;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        Just(FieldType::String),
        Just(FieldType::Integer),
        Just(FieldType::Float),
        Just(FieldType::Boolean),
        Just(FieldType::Bytes),
        Just(FieldType::Timestamp),
    ]
}

fn arb_field() -> impl Strategy<Value = FieldDef> {
    (arb_field_type(), any::<bool>()).prop_map(|(ty, required)| {
        if required {
            FieldDef::required(ty)
        } else {
            FieldDef::optional(ty)
        }
    })
}

fn arb_schema() -> impl Strategy<Value = SchemaDefinition> {
    (
        (0u64..5, 0u64..20, 0u64..20),
        prop::collection::btree_map("[a-z_]{2,12}", arb_field(), 1..12),
    )
        .prop_map(|((major, minor, patch), fields)| SchemaDefinition {
            version: Version::new(major, minor, patch),
            fields,
        })
}

fn arb_risk() -> impl Strategy<Value = RiskTier> {
    prop_oneof![
        Just(RiskTier::Low),
        Just(RiskTier::Medium),
        Just(RiskTier::High),
        Just(RiskTier::Critical),
    ]
}

fn bumped(schema: &SchemaDefinition) -> SchemaDefinition {
    let mut next = schema.clone();
    next.version = Version::new(schema.version.major + 1, 0, 0);
    next
}

/// Break `count` fields of `prior` by retyping them
fn retyped(prior: &SchemaDefinition, count: usize) -> SchemaDefinition {
    let mut candidate = bumped(prior);
    for field in candidate.fields.values_mut().take(count) {
        field.ty = match field.ty {
            FieldType::String => FieldType::Integer,
            _ => FieldType::String,
        };
    }
    candidate
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn first_version_never_needs_approval(schema in arb_schema()) {
        let classifier = ChangeClassifier::default();
        let change = ProposedChange::schema("orders", schema);
        prop_assert!(!classifier.classify(&change, None).requires_approval());
    }

    #[test]
    fn unchanged_fields_with_newer_version_need_no_approval(schema in arb_schema()) {
        let classifier = ChangeClassifier::default();
        let change = ProposedChange::schema("orders", bumped(&schema));
        prop_assert!(!classifier.classify(&change, Some(&schema)).requires_approval());
    }

    #[test]
    fn any_breaking_change_requires_approval(schema in arb_schema(), count in 1usize..12) {
        let classifier = ChangeClassifier::default();
        let candidate = retyped(&schema, count);
        let change = ProposedChange::schema("orders", candidate);

        match classifier.classify(&change, Some(&schema)) {
            Classification::ApprovalRequired(details) => {
                prop_assert!(!details.breaking_changes.is_empty());
                prop_assert_eq!(
                    details.breaking_changes.len(),
                    count.min(schema.fields.len())
                );
            }
            Classification::NoApprovalNeeded { reason } => {
                prop_assert!(false, "breaking change passed as: {}", reason);
            }
        }
    }

    #[test]
    fn non_advancing_version_requires_approval(schema in arb_schema()) {
        let classifier = ChangeClassifier::default();
        let change = ProposedChange::schema("orders", schema.clone());
        prop_assert!(classifier.classify(&change, Some(&schema)).requires_approval());
    }

    #[test]
    fn more_breaking_changes_never_lower_level(schema in arb_schema(), a in 1usize..12, b in 1usize..12) {
        let (fewer, more) = (a.min(b), a.max(b));
        let classifier = ChangeClassifier::default();
        let level = |count| {
            classifier
                .classify(&ProposedChange::schema("orders", retyped(&schema, count)), Some(&schema))
                .level()
                .unwrap_or(ApprovalLevel::Standard)
        };
        prop_assert!(level(fewer) <= level(more));
    }

    #[test]
    fn compatibility_mode_none_never_requires_approval(schema in arb_schema(), count in 1usize..12) {
        let classifier = ChangeClassifier::new(ClassifierPolicy {
            compatibility: CompatibilityMode::None,
            ..ClassifierPolicy::default()
        });
        let change = ProposedChange::schema("orders", retyped(&schema, count));
        prop_assert!(!classifier.classify(&change, Some(&schema)).requires_approval());
    }

    #[test]
    fn risk_below_threshold_never_requires_approval(tier in arb_risk(), threshold in arb_risk()) {
        let classifier = ChangeClassifier::new(ClassifierPolicy {
            risk_threshold: threshold,
            ..ClassifierPolicy::default()
        });
        let change = ProposedChange::with_risk("payments", SubjectKind::Module, Version::new(1, 0, 0), tier);
        prop_assert_eq!(classifier.classify(&change, None).requires_approval(), tier >= threshold);
    }
}
