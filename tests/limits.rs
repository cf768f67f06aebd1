use std::collections::BTreeSet;

use acctree::model::{
    Field, FieldChange, FieldValue, Limit, LimitKind, Limits, LimitsDraft, MergeSign, SetPatch,
    apply_patches,
};
use rstest::rstest;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[rstest]
#[case::count("10", Limit::Value(10))]
#[case::zero("0", Limit::Value(0))]
#[case::negative("-1", Limit::Unlimited)]
#[case::any_negative("-25", Limit::Unlimited)]
#[case::keyword("UNLIMITED", Limit::Unlimited)]
#[case::keyword_lowercase("infinite", Limit::Unlimited)]
fn count_limits(#[case] raw: &str, #[case] expected: Limit) {
    assert_eq!(Limit::parse(LimitKind::MaxJobs, raw), Ok(expected));
}

#[rstest]
#[case::minutes("90", 90)]
#[case::minutes_seconds("1:30", 2)]
#[case::exact_minutes_seconds("2:00", 2)]
#[case::hours_minutes_seconds("2:00:00", 120)]
#[case::days_hours("1-0", 1440)]
#[case::days_hours_minutes("1-2:30", 1590)]
#[case::days_hours_minutes_seconds("0-00:00:01", 1)]
#[case::largest_minutes("307445734561825860", 307445734561825860)]
fn duration_limits_are_minutes(#[case] raw: &str, #[case] minutes: u64) {
    assert_eq!(
        Limit::parse(LimitKind::GrpWall, raw),
        Ok(Limit::Value(minutes))
    );
}

#[rstest]
#[case(LimitKind::MaxJobs, "")]
#[case(LimitKind::MaxJobs, "lots")]
#[case(LimitKind::MaxJobs, "1:00")]
#[case(LimitKind::MaxJobs, "-x")]
#[case(LimitKind::GrpWall, "1:2:3:4")]
#[case(LimitKind::GrpWall, "a-10")]
#[case(LimitKind::GrpWall, "999999999999999999")]
#[case(LimitKind::GrpWall, "99999999999999999-0")]
#[case(LimitKind::GrpWall, "0-9999999999999999")]
#[case(LimitKind::MaxWallDurationPerJob, "1:18446744073709551615")]
#[case(LimitKind::MaxJobs, "18446744073709551616")]
fn malformed_limits_are_rejected(#[case] kind: LimitKind, #[case] raw: &str) {
    assert!(Limit::parse(kind, raw).is_err());
}

#[test]
fn set_patches_apply_in_order() {
    let base = set(&["normal", "low"]);
    let patches = vec![
        SetPatch::from_list(MergeSign::Add, "high, gpu"),
        SetPatch::from_list(MergeSign::Remove, "low,,gpu"),
    ];
    assert_eq!(apply_patches(&base, &patches), set(&["high", "normal"]));

    let replaced = apply_patches(&base, &[SetPatch::from_list(MergeSign::Set, "debug")]);
    assert_eq!(replaced, set(&["debug"]));
}

#[test]
fn unlimited_matches_an_absent_limit() {
    let draft = LimitsDraft {
        values: [(LimitKind::MaxJobs, Limit::Unlimited)].into_iter().collect(),
        ..LimitsDraft::default()
    };
    let mut changes = Vec::new();
    draft.diff(&Limits::default(), &mut changes);
    assert!(changes.is_empty());
}

#[test]
fn diff_reports_only_declared_differences() {
    let base = Limits {
        values: [(LimitKind::MaxJobs, 4), (LimitKind::GrpJobs, 8)]
            .into_iter()
            .collect(),
        qos: set(&["normal"]),
        default_qos: Some("normal".to_string()),
    };
    let draft = LimitsDraft {
        values: [
            (LimitKind::MaxJobs, Limit::Value(8)),
            (LimitKind::GrpJobs, Limit::Value(8)),
        ]
        .into_iter()
        .collect(),
        qos: vec![SetPatch::from_list(MergeSign::Add, "normal")],
        default_qos: Some(String::new()),
    };
    let mut changes = Vec::new();

    draft.diff(&base, &mut changes);

    assert_eq!(
        changes,
        vec![
            FieldChange {
                field: Field::Limit(LimitKind::MaxJobs),
                before: FieldValue::Count(Some(4)),
                after: FieldValue::Count(Some(8)),
            },
            FieldChange {
                field: Field::DefaultQos,
                before: FieldValue::Text(Some("normal".to_string())),
                after: FieldValue::Text(None),
            },
        ]
    );
    assert_eq!(changes[0].to_string(), "MaxJobs: 4 -> 8");

    let applied = draft.apply_to(&base);
    assert_eq!(applied.values.get(&LimitKind::MaxJobs), Some(&8));
    assert_eq!(applied.default_qos, None);
}

#[test]
fn later_declarations_win_when_merged() {
    let mut first = LimitsDraft {
        values: [(LimitKind::MaxJobs, Limit::Value(4))].into_iter().collect(),
        qos: vec![SetPatch::from_list(MergeSign::Add, "high")],
        default_qos: Some("high".to_string()),
    };
    first.merge(LimitsDraft {
        values: [(LimitKind::MaxJobs, Limit::Unlimited)].into_iter().collect(),
        qos: vec![SetPatch::from_list(MergeSign::Remove, "high")],
        default_qos: None,
    });

    assert_eq!(first.values.get(&LimitKind::MaxJobs), Some(&Limit::Unlimited));
    assert_eq!(first.qos.len(), 2);
    assert_eq!(first.default_qos.as_deref(), Some("high"));
    assert!(first.apply_to(&Limits::default()).qos.is_empty());
}

#[test]
fn oversized_duration_reports_the_range() {
    assert_eq!(
        Limit::parse(LimitKind::GrpWall, "99999999999999999-0"),
        Err("value out of range".to_string())
    );
}
