use std::collections::BTreeSet;
use std::fmt;

use super::AdminLevel;
use super::limits::LimitKind;

/// A field that can differ between a declaration and the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Description,
    OrgString,
    Parent,
    DefaultOrg,
    AdminLevel,
    Coordinators,
    Qos,
    DefaultQos,
    Limit(LimitKind),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Description => f.write_str("Description"),
            Field::OrgString => f.write_str("Organization"),
            Field::Parent => f.write_str("Parent"),
            Field::DefaultOrg => f.write_str("DefaultAccount"),
            Field::AdminLevel => f.write_str("AdminLevel"),
            Field::Coordinators => f.write_str("Coordinator"),
            Field::Qos => f.write_str("QOS"),
            Field::DefaultQos => f.write_str("DefaultQOS"),
            Field::Limit(kind) => f.write_str(kind.key()),
        }
    }
}

/// Typed value of a [`Field`], before or after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    /// `None` is unlimited.
    Count(Option<u64>),
    Tags(BTreeSet<String>),
    Admin(AdminLevel),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(Some(text)) => f.write_str(text),
            FieldValue::Text(None) => f.write_str("(unset)"),
            FieldValue::Count(Some(count)) => write!(f, "{count}"),
            FieldValue::Count(None) => f.write_str("unlimited"),
            FieldValue::Tags(tags) if tags.is_empty() => f.write_str("(none)"),
            FieldValue::Tags(tags) => {
                let joined: Vec<&str> = tags.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
            FieldValue::Admin(level) => write!(f, "{level}"),
        }
    }
}

/// One differing field of a modified entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: Field,
    pub before: FieldValue,
    pub after: FieldValue,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.before, self.after)
    }
}
