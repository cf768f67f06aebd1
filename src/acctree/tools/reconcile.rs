//! Classifies drafts against a live snapshot.

use std::collections::HashMap;

use tracing::debug;

use crate::acctree::tools::model::{
    AssociationDraft, ClusterDraft, Draft, EntityKey, Field, FieldChange, FieldValue, Limits,
    OrganizationDraft, PrincipalDraft, ROOT_ORGANIZATION, Snapshot, apply_patches,
};

/// Outcome of comparing a draft to the live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    New,
    Modified(Vec<FieldChange>),
    Unchanged,
}

/// An existing entity with the fields that must change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub key: EntityKey,
    /// The merged declaration the changes were computed from.
    pub draft: Draft,
    pub changes: Vec<FieldChange>,
}

/// Classified drafts, in first-declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub added: Vec<Draft>,
    pub modified: Vec<Modification>,
    pub unchanged: Vec<EntityKey>,
}

struct Pending {
    draft: Draft,
    classification: Classification,
}

/// Accumulates drafts for one load.
///
/// A key declared twice is merged into its first declaration and classified
/// again, so an entity is never added twice.
pub struct Reconciler<'s> {
    snapshot: &'s Snapshot,
    cluster_exists: bool,
    live: HashMap<EntityKey, usize>,
    pending: Vec<Pending>,
    seen: HashMap<EntityKey, usize>,
}

impl<'s> Reconciler<'s> {
    /// `cluster_exists` is false when the snapshot stands in for a cluster the
    /// provider does not know yet.
    pub fn new(snapshot: &'s Snapshot, cluster_exists: bool) -> Self {
        let mut live = HashMap::new();
        for (index, org) in snapshot.organizations.iter().enumerate() {
            live.insert(EntityKey::Organization(org.name.clone()), index);
        }
        for (index, principal) in snapshot.principals.iter().enumerate() {
            live.insert(EntityKey::Principal(principal.name.clone()), index);
        }
        for (index, assoc) in snapshot.associations.iter().enumerate() {
            live.insert(
                EntityKey::Association {
                    principal: assoc.principal.clone(),
                    organization: assoc.organization.clone(),
                    partition: assoc.partition.clone(),
                },
                index,
            );
        }

        Self {
            snapshot,
            cluster_exists,
            live,
            pending: Vec::new(),
            seen: HashMap::new(),
        }
    }

    /// Classifies a draft, merging it into an earlier one with the same key.
    pub fn submit(&mut self, draft: Draft) -> &Classification {
        let key = draft.key();
        let index = match self.seen.get(&key) {
            Some(&index) => {
                let mut merged = self.pending[index].draft.clone();
                merged.merge(draft);
                let classification = self.classify(&merged);
                self.pending[index] = Pending {
                    draft: merged,
                    classification,
                };
                index
            }
            None => {
                let classification = self.classify(&draft);
                self.pending.push(Pending {
                    draft,
                    classification,
                });
                self.seen.insert(key.clone(), self.pending.len() - 1);
                self.pending.len() - 1
            }
        };

        let classification = &self.pending[index].classification;
        debug!(%key, ?classification, "classified declaration");
        classification
    }

    pub fn finish(self) -> Reconciled {
        let mut reconciled = Reconciled::default();
        for pending in self.pending {
            let key = pending.draft.key();
            match pending.classification {
                Classification::New => reconciled.added.push(pending.draft),
                Classification::Modified(changes) => reconciled.modified.push(Modification {
                    key,
                    draft: pending.draft,
                    changes,
                }),
                Classification::Unchanged => reconciled.unchanged.push(key),
            }
        }
        reconciled
    }

    fn classify(&self, draft: &Draft) -> Classification {
        let changes = match draft {
            Draft::Cluster(cluster) => {
                if !self.cluster_exists {
                    return Classification::New;
                }
                self.diff_cluster(cluster)
            }
            other => match self.live.get(&other.key()) {
                None => return Classification::New,
                Some(&index) => self.diff_existing(other, index),
            },
        };

        if changes.is_empty() {
            Classification::Unchanged
        } else {
            Classification::Modified(changes)
        }
    }

    fn diff_cluster(&self, cluster: &ClusterDraft) -> Vec<FieldChange> {
        let fallback = Limits::default();
        let root = self
            .snapshot
            .organization(ROOT_ORGANIZATION)
            .map_or(&fallback, |root| &root.limits);
        let mut changes = Vec::new();
        cluster.limits.diff(root, &mut changes);
        changes
    }

    fn diff_existing(&self, draft: &Draft, index: usize) -> Vec<FieldChange> {
        match draft {
            Draft::Organization(org) => self.diff_organization(org, index),
            Draft::Principal(principal) => self.diff_principal(principal, index),
            Draft::Association(assoc) => self.diff_association(assoc, index),
            Draft::Cluster(cluster) => self.diff_cluster(cluster),
        }
    }

    fn diff_organization(&self, draft: &OrganizationDraft, index: usize) -> Vec<FieldChange> {
        let existing = &self.snapshot.organizations[index];
        let mut changes = Vec::new();

        if let Some(description) = &draft.description {
            if *description != existing.description {
                changes.push(text_change(
                    Field::Description,
                    &existing.description,
                    description,
                ));
            }
        }
        if let Some(org_string) = &draft.org_string {
            if *org_string != existing.org_string {
                changes.push(text_change(Field::OrgString, &existing.org_string, org_string));
            }
        }
        if existing.name != ROOT_ORGANIZATION
            && existing.parent.as_deref() != Some(draft.parent.as_str())
        {
            changes.push(FieldChange {
                field: Field::Parent,
                before: FieldValue::Text(existing.parent.clone()),
                after: FieldValue::Text(Some(draft.parent.clone())),
            });
        }

        draft.limits.diff(&existing.limits, &mut changes);
        changes
    }

    fn diff_principal(&self, draft: &PrincipalDraft, index: usize) -> Vec<FieldChange> {
        let existing = &self.snapshot.principals[index];
        let mut changes = Vec::new();

        if let Some(default_org) = &draft.default_org {
            if *default_org != existing.default_org {
                changes.push(text_change(Field::DefaultOrg, &existing.default_org, default_org));
            }
        }
        if let Some(level) = draft.admin_level {
            if level != existing.admin_level {
                changes.push(FieldChange {
                    field: Field::AdminLevel,
                    before: FieldValue::Admin(existing.admin_level),
                    after: FieldValue::Admin(level),
                });
            }
        }
        if !draft.coordinators.is_empty() {
            let after = apply_patches(&existing.coordinator_of, &draft.coordinators);
            if after != existing.coordinator_of {
                changes.push(FieldChange {
                    field: Field::Coordinators,
                    before: FieldValue::Tags(existing.coordinator_of.clone()),
                    after: FieldValue::Tags(after),
                });
            }
        }
        changes
    }

    fn diff_association(&self, draft: &AssociationDraft, index: usize) -> Vec<FieldChange> {
        let existing = &self.snapshot.associations[index];
        let mut changes = Vec::new();
        draft.limits.diff(&existing.limits, &mut changes);
        changes
    }
}

fn text_change(field: Field, before: &str, after: &str) -> FieldChange {
    FieldChange {
        field,
        before: FieldValue::Text(Some(before.to_string())),
        after: FieldValue::Text(Some(after.to_string())),
    }
}
