mod common;

use acctree::build::{Fields, build_organization, build_principal};
use acctree::io::dump::{account_line, user_line};
use acctree::io::lines::LineAssembler;
use acctree::io::store::SnapshotStore;
use acctree::io::tokenize::parse_declaration;
use acctree::model::{LimitKind, Limits, Snapshot};
use acctree::sync;
use common::{
    association, dump_string, load_str, organization, principal, sample_snapshot, store_with,
    tags,
};

fn declaration(text: &str) -> acctree::io::tokenize::Declaration {
    let line = LineAssembler::new(text.as_bytes())
        .next()
        .expect("one line")
        .expect("line read");
    let (declaration, errors) = parse_declaration(&line).expect("declaration parsed");
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    declaration
}

#[test]
fn dump_load_commit_dump_reproduces_the_file() {
    let original = sample_snapshot();
    let first = dump_string(&original);

    let mut store = SnapshotStore::default();
    let result = load_str(&first, &store);
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert!(result.modified.is_empty());
    assert_eq!(result.added.len(), 13);

    sync::commit(&result, &mut store.committer("test"))
        .into_result()
        .expect("commit succeeds");
    let restored = store.cluster("test").expect("cluster created");
    let second = dump_string(restored);

    assert_eq!(first, second);
    assert_eq!(restored.organization("ai"), original.organization("ai"));
    assert_eq!(restored.principal("alice"), original.principal("alice"));
}

#[test]
fn reloading_a_dump_of_live_state_changes_nothing() {
    let store = store_with(sample_snapshot());
    let dumped = dump_string(store.cluster("test").expect("sample cluster"));

    let result = load_str(&dumped, &store);

    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert!(result.added.is_empty(), "unexpected additions: {:?}", result.added);
    assert!(result.modified.is_empty(), "unexpected changes: {:?}", result.modified);
    assert!(!result.has_changes());
}

#[test]
fn dump_places_parent_blocks_depth_first() {
    let dumped = dump_string(&sample_snapshot());
    let lines: Vec<&str> = dumped.lines().collect();

    assert_eq!(
        lines,
        vec![
            "Cluster - 'test':Fairshare=1:QOS='normal'",
            "Parent - 'root'",
            "User - 'root':DefaultAccount='root':AdminLevel='Administrator'",
            "Account - 'bio':Description='Biology':Organization='bio'",
            "Account - 'cs':Description='Computer Science':Organization='sci':Fairshare=10:MaxJobs=50:QOS='high,normal':DefaultQOS='normal'",
            "Parent - 'bio'",
            "User - 'bob':DefaultAccount='bio'",
            "Parent - 'cs'",
            "User - 'alice':DefaultAccount='cs':AdminLevel='Operator':Coordinator='cs':Partition='debug':MaxJobs=10",
            "User - 'bob':DefaultAccount='bio'",
            "Account - 'ai':Description='A\\#I \\'lab\\' \\\"x\\\" \\\\ y: z':Organization='ai':GrpWall=1440",
            "Parent - 'ai'",
            "User - 'carol':DefaultAccount='ai':MaxWallDurationPerJob=60",
        ]
    );
}

#[test]
fn account_line_survives_parse_and_rebuild() {
    let mut org = organization("ai", "cs", "Machine # learning: 'deep' \\ \"wide\"");
    org.org_string = "sci=ai".to_string();
    org.limits = Limits {
        values: [(LimitKind::GrpJobs, 7), (LimitKind::GrpWall, 90)]
            .into_iter()
            .collect(),
        qos: tags(&["gpu", "normal"]),
        default_qos: Some("gpu".to_string()),
    };
    let line = account_line(&org);

    let parsed = declaration(&line);
    let mut errors = Vec::new();
    let fields = Fields::collect(parsed.kind, &parsed.options, &mut errors);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let rebuilt = build_organization(fields, "cs")
        .expect("organization built")
        .to_record();

    assert_eq!(rebuilt, org);
    assert_eq!(account_line(&rebuilt), line);
}

#[test]
fn user_line_survives_parse_and_rebuild() {
    let mut bob = principal("bob", "bio");
    bob.coordinator_of = tags(&["bio", "cs"]);
    let mut binding = association("test", "bob", "cs");
    binding.partition = Some("long:queue".to_string());
    binding.limits.values.insert(LimitKind::MaxSubmitJobs, 100);
    let line = user_line(Some(&bob), &binding);

    let parsed = declaration(&line);
    let mut errors = Vec::new();
    let fields = Fields::collect(parsed.kind, &parsed.options, &mut errors);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let (principal_draft, association_draft) =
        build_principal(fields, "cs", "test").expect("user built");

    assert_eq!(principal_draft.to_record(), bob);
    assert_eq!(association_draft.to_record(), binding);
    assert_eq!(
        user_line(
            Some(&principal_draft.to_record()),
            &association_draft.to_record()
        ),
        line
    );
}

#[test]
fn dump_skips_entries_cut_off_from_the_root() {
    let mut snapshot = Snapshot::empty("test");
    snapshot
        .organizations
        .push(organization("orphan", "missing", "Orphan"));
    snapshot
        .organizations
        .push(organization("left", "right", "Left"));
    snapshot
        .organizations
        .push(organization("right", "left", "Right"));
    snapshot.organizations.push(organization("kept", "root", "Kept"));
    snapshot.principals.push(principal("dave", "orphan"));
    snapshot
        .associations
        .push(association("test", "dave", "orphan"));

    let dumped = dump_string(&snapshot);

    assert_eq!(
        dumped,
        "Cluster - 'test'\nParent - 'root'\nAccount - 'kept':Description='Kept':Organization='kept'\n"
    );
}
