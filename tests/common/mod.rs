#![allow(dead_code)]

use std::collections::BTreeSet;

use acctree::io::store::SnapshotStore;
use acctree::model::{
    AdminLevel, Association, LimitKind, Limits, Organization, Principal, Snapshot,
};
use acctree::sync::{self, LoadOptions, LoadResult};

pub fn tags(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub fn limits(values: &[(LimitKind, u64)]) -> Limits {
    Limits {
        values: values.iter().copied().collect(),
        ..Limits::default()
    }
}

pub fn organization(name: &str, parent: &str, description: &str) -> Organization {
    Organization {
        name: name.to_string(),
        description: description.to_string(),
        org_string: name.to_string(),
        parent: Some(parent.to_string()),
        limits: Limits::default(),
    }
}

pub fn principal(name: &str, default_org: &str) -> Principal {
    Principal {
        name: name.to_string(),
        default_org: default_org.to_string(),
        admin_level: AdminLevel::None,
        coordinator_of: BTreeSet::new(),
    }
}

pub fn association(cluster: &str, principal: &str, organization: &str) -> Association {
    Association {
        cluster: cluster.to_string(),
        organization: organization.to_string(),
        principal: principal.to_string(),
        partition: None,
        limits: Limits::default(),
    }
}

/// A three level hierarchy:
///
/// ```text
/// root ── user root
///  ├─ bio ── user bob
///  └─ cs ── users alice (debug partition), bob
///      └─ ai ── user carol
/// ```
pub fn sample_snapshot() -> Snapshot {
    let cluster = "test";
    let mut snapshot = Snapshot::empty(cluster);
    snapshot.organizations[0].limits = Limits {
        values: [(LimitKind::Fairshare, 1)].into_iter().collect(),
        qos: tags(&["normal"]),
        default_qos: None,
    };

    let mut cs = organization("cs", "root", "Computer Science");
    cs.org_string = "sci".to_string();
    cs.limits = Limits {
        values: [(LimitKind::Fairshare, 10), (LimitKind::MaxJobs, 50)]
            .into_iter()
            .collect(),
        qos: tags(&["high", "normal"]),
        default_qos: Some("normal".to_string()),
    };
    let mut ai = organization("ai", "cs", "A#I 'lab' \"x\" \\ y: z");
    ai.limits = limits(&[(LimitKind::GrpWall, 1440)]);
    let bio = organization("bio", "root", "Biology");
    snapshot.organizations.extend([cs, ai, bio]);

    let mut root_user = principal("root", "root");
    root_user.admin_level = AdminLevel::Administrator;
    let mut alice = principal("alice", "cs");
    alice.admin_level = AdminLevel::Operator;
    alice.coordinator_of = tags(&["cs"]);
    let bob = principal("bob", "bio");
    let carol = principal("carol", "ai");
    snapshot.principals.extend([root_user, alice, bob, carol]);

    let mut alice_cs = association(cluster, "alice", "cs");
    alice_cs.partition = Some("debug".to_string());
    alice_cs.limits = limits(&[(LimitKind::MaxJobs, 10)]);
    let mut carol_ai = association(cluster, "carol", "ai");
    carol_ai.limits = limits(&[(LimitKind::MaxWallDurationPerJob, 60)]);
    snapshot.associations.extend([
        association(cluster, "root", "root"),
        association(cluster, "bob", "bio"),
        alice_cs,
        association(cluster, "bob", "cs"),
        carol_ai,
    ]);
    snapshot
}

pub fn store_with(snapshot: Snapshot) -> SnapshotStore {
    let mut store = SnapshotStore::default();
    store.insert(snapshot);
    store
}

pub fn load_str(text: &str, store: &SnapshotStore) -> LoadResult {
    sync::load(text.as_bytes(), store, &LoadOptions::default()).expect("load succeeds")
}

pub fn dump_string(snapshot: &Snapshot) -> String {
    let mut buffer = Vec::new();
    sync::dump(snapshot, &mut buffer).expect("dump succeeds");
    String::from_utf8(buffer).expect("dump is UTF-8")
}
