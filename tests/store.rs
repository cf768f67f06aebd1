mod common;

use std::fs;

use acctree::ToolError;
use acctree::io::store::SnapshotStore;
use acctree::model::{
    AdminLevel, Draft, EntityKey, Field, FieldChange, FieldValue, LimitKind, OrganizationDraft,
    LimitsDraft,
};
use acctree::reconcile::Modification;
use acctree::sync::{self, CommitSink, LoadOptions};
use common::{dump_string, load_str, sample_snapshot, store_with};
use tempfile::tempdir;

#[test]
fn missing_store_file_opens_empty() {
    let temp_dir = tempdir().expect("temporary directory");
    let store = SnapshotStore::open(&temp_dir.path().join("absent.json")).expect("store opened");
    assert!(store.clusters.is_empty());
}

#[test]
fn saved_store_reopens_unchanged() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("state.json");
    let store = store_with(sample_snapshot());

    store.save(&path).expect("store saved");
    let reopened = SnapshotStore::open(&path).expect("store reopened");

    assert_eq!(reopened, store);
}

#[test]
fn load_file_commits_into_a_saved_store() {
    let temp_dir = tempdir().expect("temporary directory");
    let store_path = temp_dir.path().join("state.json");
    let input = temp_dir.path().join("hierarchy.cfg");
    fs::write(&input, dump_string(&sample_snapshot())).expect("load file written");

    let mut store = SnapshotStore::open(&store_path).expect("store opened");
    let result = sync::load_file(&input, &store, &LoadOptions::default()).expect("load succeeds");
    sync::commit(&result, &mut store.committer("test"))
        .into_result()
        .expect("commit succeeds");
    store.save(&store_path).expect("store saved");

    let reopened = SnapshotStore::open(&store_path).expect("store reopened");
    let snapshot = reopened.cluster("test").expect("cluster stored");
    assert_eq!(snapshot.organizations.len(), 4);
    assert_eq!(snapshot.associations.len(), 5);
    assert_eq!(
        snapshot.principal("root").map(|root| root.admin_level),
        Some(AdminLevel::Administrator)
    );
}

#[test]
fn load_file_rejects_a_missing_input() {
    let temp_dir = tempdir().expect("temporary directory");
    let missing = temp_dir.path().join("missing.cfg");

    let error = sync::load_file(&missing, &SnapshotStore::default(), &LoadOptions::default())
        .expect_err("missing input rejected");

    assert!(matches!(error, ToolError::MissingInput(path) if path == missing));
}

#[test]
fn dump_cluster_writes_the_output_file() {
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("dump.cfg");
    let store = store_with(sample_snapshot());

    sync::dump_cluster(&store, "test", Some(&output)).expect("dump written");

    let written = fs::read_to_string(&output).expect("dump read");
    assert_eq!(written, dump_string(&sample_snapshot()));
}

#[test]
fn dump_cluster_rejects_an_unknown_cluster() {
    let store = store_with(sample_snapshot());

    let error = sync::dump_cluster(&store, "other", None).expect_err("unknown cluster");

    assert!(matches!(error, ToolError::UnknownCluster(name) if name == "other"));
}

#[test]
fn adding_an_existing_entity_fails() {
    let mut store = store_with(sample_snapshot());
    let draft = Draft::Organization(OrganizationDraft {
        name: "cs".to_string(),
        description: None,
        org_string: None,
        parent: "root".to_string(),
        limits: LimitsDraft::default(),
    });

    let error = store
        .committer("test")
        .add(&draft)
        .expect_err("duplicate rejected");

    assert!(matches!(error, ToolError::Commit { ref key, .. } if key == "account cs"));
}

#[test]
fn new_cluster_is_created_under_the_committer_name() {
    let mut store = SnapshotStore::default();
    let result = load_str("Cluster - test:Fairshare=3\nParent - root\nAccount - cs\n", &store);

    let report = sync::commit(&result, &mut store.committer("test"));

    assert_eq!(report.committed, 2);
    assert!(report.failure.is_none());
    let snapshot = store.cluster("test").expect("cluster created");
    assert_eq!(snapshot.cluster, "test");
    assert_eq!(
        snapshot
            .organization("root")
            .and_then(|root| root.limits.values.get(&LimitKind::Fairshare)),
        Some(&3)
    );
    assert!(snapshot.organization("cs").is_some());
}

#[test]
fn adding_to_a_cluster_that_was_never_created_fails() {
    let mut store = SnapshotStore::default();
    let draft = Draft::Organization(OrganizationDraft {
        name: "cs".to_string(),
        description: None,
        org_string: None,
        parent: "root".to_string(),
        limits: LimitsDraft::default(),
    });

    let error = store
        .committer("test")
        .add(&draft)
        .expect_err("cluster missing");

    assert!(matches!(error, ToolError::Commit { ref reason, .. } if reason.contains("does not exist")));
}

#[test]
fn modifications_update_stored_records() {
    let mut store = store_with(sample_snapshot());
    let modification = Modification {
        key: EntityKey::Organization("ai".to_string()),
        draft: Draft::Organization(OrganizationDraft {
            name: "ai".to_string(),
            description: None,
            org_string: None,
            parent: "bio".to_string(),
            limits: LimitsDraft::default(),
        }),
        changes: vec![
            FieldChange {
                field: Field::Parent,
                before: FieldValue::Text(Some("cs".to_string())),
                after: FieldValue::Text(Some("bio".to_string())),
            },
            FieldChange {
                field: Field::Limit(LimitKind::GrpWall),
                before: FieldValue::Count(Some(1440)),
                after: FieldValue::Count(None),
            },
        ],
    };

    store
        .committer("test")
        .modify(&modification)
        .expect("modification applied");

    let ai = store
        .cluster("test")
        .and_then(|snapshot| snapshot.organization("ai"))
        .expect("ai stored");
    assert_eq!(ai.parent.as_deref(), Some("bio"));
    assert!(ai.limits.values.is_empty());
}

#[test]
fn modifying_an_unknown_entity_fails() {
    let mut store = store_with(sample_snapshot());
    let modification = Modification {
        key: EntityKey::Principal("mallory".to_string()),
        draft: Draft::Organization(OrganizationDraft {
            name: "unused".to_string(),
            description: None,
            org_string: None,
            parent: "root".to_string(),
            limits: LimitsDraft::default(),
        }),
        changes: Vec::new(),
    };

    let error = store
        .committer("test")
        .modify(&modification)
        .expect_err("unknown principal");

    assert!(matches!(error, ToolError::Commit { ref reason, .. } if reason == "does not exist"));
}
