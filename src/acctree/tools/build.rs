//! Turns tokenized declarations into typed drafts.

use crate::acctree::tools::error::ParseError;
use crate::acctree::tools::io::tokenize::{DeclarationKind, RawOption};
use crate::acctree::tools::model::{
    AdminLevel, AssociationDraft, ClusterDraft, Limit, LimitKind, LimitsDraft, MergeSign,
    OrganizationDraft, PrincipalDraft, SetPatch,
};

/// Target of a recognised option key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setter {
    Name,
    Description,
    OrgString,
    AdminLevel,
    Coordinators,
    DefaultOrg,
    Partition,
    Qos,
    DefaultQos,
    Limit(LimitKind),
}

impl Setter {
    /// Resolves a key, ignoring case.
    pub fn lookup(key: &str) -> Option<Setter> {
        let setter = match key.to_ascii_lowercase().as_str() {
            "name" => Setter::Name,
            "description" | "desc" => Setter::Description,
            "organization" | "org" => Setter::OrgString,
            "adminlevel" | "admin" => Setter::AdminLevel,
            "coordinator" | "coordinators" => Setter::Coordinators,
            "defaultaccount" | "defaultorganization" => Setter::DefaultOrg,
            "partition" => Setter::Partition,
            "qos" => Setter::Qos,
            "defaultqos" => Setter::DefaultQos,
            other => return LimitKind::from_key(other).map(Setter::Limit),
        };
        Some(setter)
    }

    /// Whether a declaration of `kind` accepts this option.
    pub fn allowed(self, kind: DeclarationKind) -> bool {
        match self {
            Setter::Name => true,
            Setter::Qos | Setter::DefaultQos | Setter::Limit(_) => kind != DeclarationKind::Parent,
            Setter::Description | Setter::OrgString => kind == DeclarationKind::Account,
            Setter::AdminLevel | Setter::Coordinators | Setter::DefaultOrg | Setter::Partition => {
                kind == DeclarationKind::User
            }
        }
    }

    fn is_set_valued(self) -> bool {
        matches!(self, Setter::Qos | Setter::Coordinators)
    }
}

/// Every option a declaration may carry, after coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub org_string: Option<String>,
    pub admin_level: Option<AdminLevel>,
    pub coordinators: Vec<SetPatch>,
    pub default_org: Option<String>,
    pub partition: Option<String>,
    pub limits: LimitsDraft,
}

impl Fields {
    /// Applies each option in order. Recoverable problems are appended to
    /// `errors` and the offending option is skipped.
    pub fn collect(kind: DeclarationKind, options: &[RawOption], errors: &mut Vec<ParseError>) -> Self {
        let mut fields = Fields::default();
        for option in options {
            if let Err(error) = fields.apply(kind, option) {
                errors.push(error);
            }
        }
        fields
    }

    fn apply(&mut self, kind: DeclarationKind, option: &RawOption) -> Result<(), ParseError> {
        let Some(key) = option.key.as_deref() else {
            self.name = Some(option.value.clone());
            return Ok(());
        };

        let setter = Setter::lookup(key)
            .filter(|setter| setter.allowed(kind))
            .ok_or_else(|| ParseError::UnknownKey {
                kind: kind.to_string(),
                key: key.to_string(),
            })?;

        if option.sign != MergeSign::Set && !setter.is_set_valued() {
            return Err(ParseError::line_format(format!(
                "'{key}' does not take '+=' or '-='"
            )));
        }

        let value = option.value.clone();
        match setter {
            Setter::Name => self.name = Some(value),
            Setter::Description => self.description = Some(value),
            Setter::OrgString => self.org_string = Some(value),
            Setter::AdminLevel => {
                let level = value.parse::<AdminLevel>().map_err(|reason| {
                    ParseError::ValueCoercion {
                        key: key.to_string(),
                        value: value.clone(),
                        reason,
                    }
                })?;
                self.admin_level = Some(level);
            }
            Setter::Coordinators => {
                self.coordinators.push(SetPatch::from_list(option.sign, &value))
            }
            Setter::DefaultOrg => self.default_org = Some(value),
            Setter::Partition => self.partition = Some(value),
            Setter::Qos => self
                .limits
                .qos
                .push(SetPatch::from_list(option.sign, &value)),
            Setter::DefaultQos => self.limits.default_qos = Some(value),
            Setter::Limit(limit) => {
                let parsed =
                    Limit::parse(limit, &value).map_err(|reason| ParseError::ValueCoercion {
                        key: key.to_string(),
                        value: value.clone(),
                        reason,
                    })?;
                self.limits.values.insert(limit, parsed);
            }
        }
        Ok(())
    }

    /// The declared entity name, or a line format error.
    pub fn require_name(&self, kind: DeclarationKind) -> Result<String, ParseError> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(ParseError::line_format(format!("{kind} declaration has no name"))),
        }
    }
}

pub fn build_cluster(fields: Fields) -> Result<ClusterDraft, ParseError> {
    Ok(ClusterDraft {
        name: fields.require_name(DeclarationKind::Cluster)?,
        limits: fields.limits,
    })
}

pub fn build_organization(fields: Fields, parent: &str) -> Result<OrganizationDraft, ParseError> {
    Ok(OrganizationDraft {
        name: fields.require_name(DeclarationKind::Account)?,
        description: fields.description,
        org_string: fields.org_string,
        parent: parent.to_string(),
        limits: fields.limits,
    })
}

/// Builds the principal and its binding to `parent` from one `User` line.
pub fn build_principal(
    fields: Fields,
    parent: &str,
    cluster: &str,
) -> Result<(PrincipalDraft, AssociationDraft), ParseError> {
    let name = fields.require_name(DeclarationKind::User)?;
    let principal = PrincipalDraft {
        name: name.clone(),
        default_org: fields.default_org,
        fallback_org: parent.to_string(),
        admin_level: fields.admin_level,
        coordinators: fields.coordinators,
    };
    let association = AssociationDraft {
        cluster: cluster.to_string(),
        principal: name,
        organization: parent.to_string(),
        partition: fields.partition,
        limits: fields.limits,
    };
    Ok((principal, association))
}
