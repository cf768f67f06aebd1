//! JSON file holding the accounting state of every cluster.
//!
//! This is the collaborator the command line tool and the integration tests
//! load against: it serves snapshots and applies committed drafts.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::acctree::tools::error::{Result, ToolError};
use crate::acctree::tools::model::{
    Draft, EntityKey, Field, FieldChange, FieldValue, Limits, Organization, Principal,
    ROOT_ORGANIZATION, Snapshot,
};
use crate::acctree::tools::reconcile::Modification;
use crate::acctree::tools::sync::{CommitSink, SnapshotProvider};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStore {
    #[serde(default)]
    pub clusters: BTreeMap<String, Snapshot>,
}

impl SnapshotStore {
    /// Reads a store, or starts an empty one when `path` does not exist.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("store file missing, starting empty");
            return Ok(Self::default());
        }
        let source = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&source)?)
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn insert(&mut self, snapshot: Snapshot) {
        self.clusters.insert(snapshot.cluster.clone(), snapshot);
    }

    pub fn cluster(&self, name: &str) -> Option<&Snapshot> {
        self.clusters.get(name)
    }

    /// A commit sink writing into `cluster`.
    pub fn committer(&mut self, cluster: &str) -> ClusterCommit<'_> {
        ClusterCommit {
            store: self,
            cluster: cluster.to_string(),
        }
    }
}

impl SnapshotProvider for SnapshotStore {
    fn fetch(&self, cluster: &str) -> Result<Option<Snapshot>> {
        Ok(self.clusters.get(cluster).cloned())
    }
}

/// Applies committed drafts to one cluster of a [`SnapshotStore`].
pub struct ClusterCommit<'a> {
    store: &'a mut SnapshotStore,
    cluster: String,
}

impl ClusterCommit<'_> {
    fn snapshot(&mut self, key: &EntityKey) -> Result<&mut Snapshot> {
        self.store
            .clusters
            .get_mut(&self.cluster)
            .ok_or_else(|| commit_error(key, format!("cluster {} does not exist", self.cluster)))
    }
}

impl CommitSink for ClusterCommit<'_> {
    fn add(&mut self, draft: &Draft) -> Result<()> {
        let key = draft.key();
        debug!(%key, "adding");

        if let Draft::Cluster(cluster) = draft {
            let name = self.cluster.clone();
            let snapshot = self
                .store
                .clusters
                .entry(name.clone())
                .or_insert_with(|| Snapshot::empty(name));
            let root = root_mut(snapshot);
            root.limits = cluster.limits.apply_to(&root.limits);
            return Ok(());
        }

        let snapshot = self.snapshot(&key)?;
        match draft {
            Draft::Organization(org) => {
                if snapshot.organization(&org.name).is_some() {
                    return Err(commit_error(&key, "already exists"));
                }
                snapshot.organizations.push(org.to_record());
            }
            Draft::Principal(principal) => {
                if snapshot.principal(&principal.name).is_some() {
                    return Err(commit_error(&key, "already exists"));
                }
                snapshot.principals.push(principal.to_record());
            }
            Draft::Association(assoc) => {
                if snapshot
                    .association(&assoc.principal, &assoc.organization, assoc.partition.as_deref())
                    .is_some()
                {
                    return Err(commit_error(&key, "already exists"));
                }
                let mut record = assoc.to_record();
                record.cluster = snapshot.cluster.clone();
                snapshot.associations.push(record);
            }
            Draft::Cluster(_) => {}
        }
        Ok(())
    }

    fn modify(&mut self, modification: &Modification) -> Result<()> {
        let key = &modification.key;
        debug!(%key, changes = modification.changes.len(), "modifying");
        let snapshot = self.snapshot(key)?;

        match key {
            EntityKey::Cluster(_) => {
                let root = root_mut(snapshot);
                for change in &modification.changes {
                    apply_limit_change(&mut root.limits, change)
                        .ok_or_else(|| unsupported(key, change))?;
                }
            }
            EntityKey::Organization(name) => {
                let org = snapshot
                    .organizations
                    .iter_mut()
                    .find(|org| &org.name == name)
                    .ok_or_else(|| commit_error(key, "does not exist"))?;
                for change in &modification.changes {
                    apply_organization_change(org, change).ok_or_else(|| unsupported(key, change))?;
                }
            }
            EntityKey::Principal(name) => {
                let principal = snapshot
                    .principals
                    .iter_mut()
                    .find(|principal| &principal.name == name)
                    .ok_or_else(|| commit_error(key, "does not exist"))?;
                for change in &modification.changes {
                    apply_principal_change(principal, change)
                        .ok_or_else(|| unsupported(key, change))?;
                }
            }
            EntityKey::Association {
                principal,
                organization,
                partition,
            } => {
                let assoc = snapshot
                    .associations
                    .iter_mut()
                    .find(|assoc| {
                        &assoc.principal == principal
                            && &assoc.organization == organization
                            && &assoc.partition == partition
                    })
                    .ok_or_else(|| commit_error(key, "does not exist"))?;
                for change in &modification.changes {
                    apply_limit_change(&mut assoc.limits, change)
                        .ok_or_else(|| unsupported(key, change))?;
                }
            }
        }
        Ok(())
    }
}

fn root_mut(snapshot: &mut Snapshot) -> &mut Organization {
    let index = match snapshot
        .organizations
        .iter()
        .position(|org| org.name == ROOT_ORGANIZATION)
    {
        Some(index) => index,
        None => {
            snapshot.organizations.insert(0, Organization::root());
            0
        }
    };
    &mut snapshot.organizations[index]
}

fn apply_limit_change(limits: &mut Limits, change: &FieldChange) -> Option<()> {
    match (&change.field, &change.after) {
        (Field::Limit(kind), FieldValue::Count(value)) => limits.set(*kind, *value),
        (Field::Qos, FieldValue::Tags(tags)) => limits.qos = tags.clone(),
        (Field::DefaultQos, FieldValue::Text(value)) => limits.default_qos = value.clone(),
        _ => return None,
    }
    Some(())
}

fn apply_organization_change(org: &mut Organization, change: &FieldChange) -> Option<()> {
    match (&change.field, &change.after) {
        (Field::Description, FieldValue::Text(Some(text))) => org.description = text.clone(),
        (Field::OrgString, FieldValue::Text(Some(text))) => org.org_string = text.clone(),
        (Field::Parent, FieldValue::Text(parent)) => org.parent = parent.clone(),
        _ => return apply_limit_change(&mut org.limits, change),
    }
    Some(())
}

fn apply_principal_change(principal: &mut Principal, change: &FieldChange) -> Option<()> {
    match (&change.field, &change.after) {
        (Field::DefaultOrg, FieldValue::Text(Some(org))) => principal.default_org = org.clone(),
        (Field::AdminLevel, FieldValue::Admin(level)) => principal.admin_level = *level,
        (Field::Coordinators, FieldValue::Tags(orgs)) => principal.coordinator_of = orgs.clone(),
        _ => return None,
    }
    Some(())
}

fn unsupported(key: &EntityKey, change: &FieldChange) -> ToolError {
    commit_error(key, format!("field {} cannot be changed here", change.field))
}

fn commit_error(key: &EntityKey, reason: impl Into<String>) -> ToolError {
    ToolError::Commit {
        key: key.to_string(),
        reason: reason.into(),
    }
}
