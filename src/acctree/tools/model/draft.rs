use std::collections::BTreeSet;
use std::fmt;

use super::limits::{Limits, LimitsDraft, SetPatch, apply_patches};
use super::{AdminLevel, Association, Organization, Principal};

/// Natural key identifying an entity across a load file and a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    Cluster(String),
    Organization(String),
    Principal(String),
    Association {
        principal: String,
        organization: String,
        partition: Option<String>,
    },
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Cluster(name) => write!(f, "cluster {name}"),
            EntityKey::Organization(name) => write!(f, "account {name}"),
            EntityKey::Principal(name) => write!(f, "user {name}"),
            EntityKey::Association {
                principal,
                organization,
                partition: Some(partition),
            } => write!(f, "association {principal}/{organization}/{partition}"),
            EntityKey::Association {
                principal,
                organization,
                partition: None,
            } => write!(f, "association {principal}/{organization}"),
        }
    }
}

/// Cluster declaration: its limits apply to the root organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDraft {
    pub name: String,
    pub limits: LimitsDraft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationDraft {
    pub name: String,
    pub description: Option<String>,
    pub org_string: Option<String>,
    pub parent: String,
    pub limits: LimitsDraft,
}

impl OrganizationDraft {
    /// Materializes a new organization. Description and organization string
    /// default to the account name.
    pub fn to_record(&self) -> Organization {
        Organization {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_else(|| self.name.clone()),
            org_string: self.org_string.clone().unwrap_or_else(|| self.name.clone()),
            parent: Some(self.parent.clone()),
            limits: self.limits.apply_to(&Limits::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalDraft {
    pub name: String,
    /// Default organization given explicitly in the file.
    pub default_org: Option<String>,
    /// Organization the principal was first bound to; used as the default
    /// organization of a new principal when none was given.
    pub fallback_org: String,
    pub admin_level: Option<AdminLevel>,
    pub coordinators: Vec<SetPatch>,
}

impl PrincipalDraft {
    pub fn to_record(&self) -> Principal {
        Principal {
            name: self.name.clone(),
            default_org: self
                .default_org
                .clone()
                .unwrap_or_else(|| self.fallback_org.clone()),
            admin_level: self.admin_level.unwrap_or_default(),
            coordinator_of: apply_patches(&BTreeSet::new(), &self.coordinators),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDraft {
    pub cluster: String,
    pub principal: String,
    pub organization: String,
    pub partition: Option<String>,
    pub limits: LimitsDraft,
}

impl AssociationDraft {
    pub fn to_record(&self) -> Association {
        Association {
            cluster: self.cluster.clone(),
            organization: self.organization.clone(),
            principal: self.principal.clone(),
            partition: self.partition.clone(),
            limits: self.limits.apply_to(&Limits::default()),
        }
    }
}

/// An in-memory candidate entity built from a load file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft {
    Cluster(ClusterDraft),
    Organization(OrganizationDraft),
    Principal(PrincipalDraft),
    Association(AssociationDraft),
}

impl Draft {
    pub fn key(&self) -> EntityKey {
        match self {
            Draft::Cluster(cluster) => EntityKey::Cluster(cluster.name.clone()),
            Draft::Organization(org) => EntityKey::Organization(org.name.clone()),
            Draft::Principal(principal) => EntityKey::Principal(principal.name.clone()),
            Draft::Association(assoc) => EntityKey::Association {
                principal: assoc.principal.clone(),
                organization: assoc.organization.clone(),
                partition: assoc.partition.clone(),
            },
        }
    }

    /// Folds a later declaration of the same entity into this one: fields the
    /// later declaration sets win, set patches accumulate.
    ///
    /// Drafts of different kinds never share a key; merging them is a no-op.
    pub fn merge(&mut self, later: Draft) {
        match (self, later) {
            (Draft::Cluster(current), Draft::Cluster(later)) => current.limits.merge(later.limits),
            (Draft::Organization(current), Draft::Organization(later)) => {
                if later.description.is_some() {
                    current.description = later.description;
                }
                if later.org_string.is_some() {
                    current.org_string = later.org_string;
                }
                current.parent = later.parent;
                current.limits.merge(later.limits);
            }
            (Draft::Principal(current), Draft::Principal(later)) => {
                if later.default_org.is_some() {
                    current.default_org = later.default_org;
                }
                if later.admin_level.is_some() {
                    current.admin_level = later.admin_level;
                }
                current.coordinators.extend(later.coordinators);
            }
            (Draft::Association(current), Draft::Association(later)) => {
                current.limits.merge(later.limits)
            }
            _ => {}
        }
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Draft::Organization(org) => write!(f, "account {} (parent {})", org.name, org.parent),
            Draft::Principal(principal) => {
                let record = principal.to_record();
                write!(f, "user {} (default account {})", record.name, record.default_org)
            }
            other => write!(f, "{}", other.key()),
        }
    }
}
