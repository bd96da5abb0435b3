//! Confidence scoring of raw usages.

use std::fmt;

use super::trace::Origin;
use super::visitor::{RawUsage, Resolution, UsageKind};
use crate::hir::LexicalContext;

/// How certain it is that a site references the queried symbol.
///
/// Ordered: `Certain > Probable > Possible > Dynamic`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Confidence {
    Dynamic,
    Possible,
    Probable,
    Certain,
}

impl Confidence {
    /// Highest first.
    pub const ALL: [Confidence; 4] = [
        Confidence::Certain,
        Confidence::Probable,
        Confidence::Possible,
        Confidence::Dynamic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Certain => "CERTAIN",
            Confidence::Probable => "PROBABLE",
            Confidence::Possible => "POSSIBLE",
            Confidence::Dynamic => "DYNAMIC",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Origin> for Confidence {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Explicit | Origin::SelfRef | Origin::Constructed => Confidence::Certain,
            Origin::Annotated => Confidence::Probable,
            Origin::Traced { .. } => Confidence::Possible,
            Origin::Untraceable => Confidence::Dynamic,
        }
    }
}

/// Tier of a usage kind when nothing weakens it.
fn base_tier(kind: UsageKind) -> Confidence {
    match kind {
        UsageKind::Instantiation
        | UsageKind::StaticMemberAccess
        | UsageKind::TypePosition
        | UsageKind::InheritanceClause
        | UsageKind::ConstantAccess
        | UsageKind::FunctionCall
        | UsageKind::Import => Confidence::Certain,
        UsageKind::InstanceMemberAccess => Confidence::Probable,
        UsageKind::DynamicCall => Confidence::Possible,
    }
}

/// Score one usage. Pure and deterministic.
///
/// Unresolved names, reflection helpers and members no declaration answers
/// (catch-all dispatch) are always `Dynamic`. Otherwise the kind's tier is
/// capped by how the receiver and any mediating string are known.
/// Null-safe access does not lower the tier.
pub fn score(usage: &RawUsage, ctx: &LexicalContext) -> Confidence {
    let evidence = &usage.evidence;
    if matches!(evidence.resolution, Resolution::Unresolved(_)) || evidence.reflective {
        return Confidence::Dynamic;
    }
    if evidence.member.as_ref().is_some_and(|m| !m.declared) {
        return Confidence::Dynamic;
    }
    if evidence.receiver == Some(Origin::SelfRef) && ctx.current_type().is_none() {
        return Confidence::Dynamic;
    }

    [evidence.receiver, evidence.mediator]
        .into_iter()
        .flatten()
        .map(Confidence::from)
        .fold(base_tier(usage.kind), Confidence::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::MemberAccess;
    use crate::ide::visitor::{Evidence, MemberEvidence};
    use rstest::rstest;
    use std::sync::Arc;
    use text_size::TextRange;

    fn usage(kind: UsageKind, evidence: Evidence) -> RawUsage {
        RawUsage {
            path: Arc::from("a.php"),
            range: TextRange::default(),
            line: 1,
            column: 1,
            snippet: Arc::from(""),
            kind,
            evidence,
        }
    }

    fn in_class() -> LexicalContext {
        let mut ctx = LexicalContext::new();
        ctx.push_type("Widget");
        ctx
    }

    fn member(declared: bool) -> Option<MemberEvidence> {
        Some(MemberEvidence {
            name: Arc::from("render"),
            access: MemberAccess::InstanceMethod,
            declared,
            catch_all: None,
        })
    }

    #[test]
    fn test_tier_order() {
        assert!(Confidence::Certain > Confidence::Probable);
        assert!(Confidence::Probable > Confidence::Possible);
        assert!(Confidence::Possible > Confidence::Dynamic);
        let mut sorted = Confidence::ALL.to_vec();
        sorted.sort();
        sorted.reverse();
        assert_eq!(sorted, Confidence::ALL.to_vec());
        assert_eq!(Confidence::Possible.to_string(), "POSSIBLE");
    }

    #[rstest]
    #[case(UsageKind::Instantiation, Confidence::Certain)]
    #[case(UsageKind::StaticMemberAccess, Confidence::Certain)]
    #[case(UsageKind::TypePosition, Confidence::Certain)]
    #[case(UsageKind::InheritanceClause, Confidence::Certain)]
    #[case(UsageKind::ConstantAccess, Confidence::Certain)]
    #[case(UsageKind::Import, Confidence::Certain)]
    #[case(UsageKind::InstanceMemberAccess, Confidence::Probable)]
    #[case(UsageKind::DynamicCall, Confidence::Possible)]
    fn test_base_tiers(#[case] kind: UsageKind, #[case] expected: Confidence) {
        assert_eq!(score(&usage(kind, Evidence::default()), &in_class()), expected);
    }

    #[rstest]
    #[case(Origin::SelfRef, Confidence::Probable)]
    #[case(Origin::Constructed, Confidence::Probable)]
    #[case(Origin::Annotated, Confidence::Probable)]
    #[case(Origin::Traced { hops: 2 }, Confidence::Possible)]
    #[case(Origin::Untraceable, Confidence::Dynamic)]
    fn test_receiver_caps_instance_access(#[case] origin: Origin, #[case] expected: Confidence) {
        let evidence = Evidence {
            receiver: Some(origin),
            member: member(true),
            ..Evidence::default()
        };
        let usage = usage(UsageKind::InstanceMemberAccess, evidence);
        assert_eq!(score(&usage, &in_class()), expected);
    }

    #[test]
    fn test_undeclared_member_is_dynamic() {
        let evidence = Evidence {
            receiver: Some(Origin::Constructed),
            member: member(false),
            ..Evidence::default()
        };
        let usage = usage(UsageKind::InstanceMemberAccess, evidence);
        assert_eq!(score(&usage, &in_class()), Confidence::Dynamic);
    }

    #[test]
    fn test_unresolved_and_reflective_are_dynamic() {
        let unresolved = Evidence {
            resolution: Resolution::Unresolved(Arc::from("Ghost")),
            ..Evidence::default()
        };
        assert_eq!(
            score(&usage(UsageKind::Instantiation, unresolved), &in_class()),
            Confidence::Dynamic
        );

        let reflective = Evidence {
            reflective: true,
            member: member(true),
            ..Evidence::default()
        };
        assert_eq!(
            score(&usage(UsageKind::DynamicCall, reflective), &in_class()),
            Confidence::Dynamic
        );
    }

    #[test]
    fn test_traced_string_mediator_is_possible() {
        let evidence = Evidence {
            mediator: Some(Origin::Traced { hops: 1 }),
            ..Evidence::default()
        };
        let usage = usage(UsageKind::Instantiation, evidence);
        assert_eq!(score(&usage, &in_class()), Confidence::Possible);
    }

    #[test]
    fn test_self_reference_outside_type_is_dynamic() {
        let evidence = Evidence {
            receiver: Some(Origin::SelfRef),
            member: member(true),
            ..Evidence::default()
        };
        let usage = usage(UsageKind::StaticMemberAccess, evidence);
        assert_eq!(score(&usage, &in_class()), Confidence::Certain);
        assert_eq!(score(&usage, &LexicalContext::new()), Confidence::Dynamic);
    }

    #[test]
    fn test_nullsafe_keeps_tier() {
        let evidence = Evidence {
            receiver: Some(Origin::Annotated),
            member: member(true),
            nullsafe: true,
            ..Evidence::default()
        };
        let usage = usage(UsageKind::InstanceMemberAccess, evidence);
        assert_eq!(score(&usage, &in_class()), Confidence::Probable);
        assert_eq!(score(&usage, &in_class()), score(&usage, &in_class()));
    }
}
