//! Accounting records: organizations, principals, their bindings and the
//! per-cluster snapshot that holds them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod change;
pub mod draft;
pub mod limits;

pub use change::{Field, FieldChange, FieldValue};
pub use draft::{
    AssociationDraft, ClusterDraft, Draft, EntityKey, OrganizationDraft, PrincipalDraft,
};
pub use limits::{Limit, LimitKind, Limits, LimitsDraft, MergeSign, SetPatch, apply_patches};

/// Name of the organization every cluster hierarchy hangs from.
pub const ROOT_ORGANIZATION: &str = "root";

/// An allocation grouping node (an "account").
///
/// The organization's own binding is folded in: `parent` and `limits` belong
/// to the association between the organization and its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    pub description: String,
    pub org_string: String,
    /// `None` only for the root organization.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub limits: Limits,
}

impl Organization {
    /// The implicit root organization of a fresh cluster.
    pub fn root() -> Self {
        Self {
            name: ROOT_ORGANIZATION.to_string(),
            description: "default root account".to_string(),
            org_string: ROOT_ORGANIZATION.to_string(),
            parent: None,
            limits: Limits::default(),
        }
    }
}

/// Administrative privilege of a principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    #[default]
    None,
    Operator,
    Administrator,
}

impl FromStr for AdminLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AdminLevel::None),
            "operator" => Ok(AdminLevel::Operator),
            "admin" | "administrator" => Ok(AdminLevel::Administrator),
            other => Err(format!("unknown admin level '{other}'")),
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminLevel::None => f.write_str("None"),
            AdminLevel::Operator => f.write_str("Operator"),
            AdminLevel::Administrator => f.write_str("Administrator"),
        }
    }
}

/// An individual that can be bound to organizations (a "user").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub default_org: String,
    #[serde(default)]
    pub admin_level: AdminLevel,
    #[serde(default)]
    pub coordinator_of: BTreeSet<String>,
}

/// Binding of a principal to an organization on one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub cluster: String,
    pub organization: String,
    pub principal: String,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub limits: Limits,
}

/// Live accounting state of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cluster: String,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub principals: Vec<Principal>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

impl Snapshot {
    /// A cluster with nothing but its root organization.
    pub fn empty(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            organizations: vec![Organization::root()],
            principals: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn organization(&self, name: &str) -> Option<&Organization> {
        self.organizations.iter().find(|org| org.name == name)
    }

    pub fn principal(&self, name: &str) -> Option<&Principal> {
        self.principals.iter().find(|principal| principal.name == name)
    }

    pub fn association(
        &self,
        principal: &str,
        organization: &str,
        partition: Option<&str>,
    ) -> Option<&Association> {
        self.associations.iter().find(|assoc| {
            assoc.principal == principal
                && assoc.organization == organization
                && assoc.partition.as_deref() == partition
        })
    }

    /// The root organization always exists, even when the snapshot omits it.
    pub fn has_organization(&self, name: &str) -> bool {
        name == ROOT_ORGANIZATION || self.organization(name).is_some()
    }
}
