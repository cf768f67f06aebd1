//! Tracks which organization new declarations are placed under.

use std::collections::HashMap;

use crate::acctree::tools::error::ParseError;
use crate::acctree::tools::model::{ROOT_ORGANIZATION, Snapshot};

/// Tracks the organization new declarations are placed under.
#[derive(Debug, Default)]
pub struct HierarchyResolver {
    current: Option<String>,
    /// Organizations declared in this load, with the parent they were placed
    /// under.
    declared: HashMap<String, String>,
    defaulted: bool,
}

/// Parent chosen for a declaration, plus whether this is the first time the
/// implicit root was used as a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub parent: String,
    pub defaulted_to_root: bool,
}

impl HierarchyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles a `Parent` declaration.
    pub fn enter_parent(&mut self, name: &str, snapshot: &Snapshot) -> Result<(), ParseError> {
        if snapshot.has_organization(name) || self.declared.contains_key(name) {
            self.current = Some(name.to_string());
            Ok(())
        } else {
            Err(ParseError::UnresolvedParent {
                parent: name.to_string(),
            })
        }
    }

    /// Parent for the next account or user declaration.
    pub fn place(&mut self) -> Placement {
        match &self.current {
            Some(parent) => Placement {
                parent: parent.clone(),
                defaulted_to_root: false,
            },
            None => {
                let first = !self.defaulted;
                self.defaulted = true;
                Placement {
                    parent: ROOT_ORGANIZATION.to_string(),
                    defaulted_to_root: first,
                }
            }
        }
    }

    /// Records an organization declared in this load so later `Parent`
    /// declarations can refer to it.
    ///
    /// Fails when `parent` sits below `name`, which would turn the hierarchy
    /// into a cycle.
    pub fn record_organization(
        &mut self,
        name: &str,
        parent: &str,
        snapshot: &Snapshot,
    ) -> Result<(), ParseError> {
        if self.is_ancestor(name, parent, snapshot) {
            return Err(ParseError::ParentCycle {
                organization: name.to_string(),
                parent: parent.to_string(),
            });
        }
        self.declared.insert(name.to_string(), parent.to_string());
        Ok(())
    }

    /// Whether `ancestor` is `start` or lies on the path from `start` to the
    /// root, with this load's placements taking precedence over the snapshot.
    fn is_ancestor(&self, ancestor: &str, start: &str, snapshot: &Snapshot) -> bool {
        let limit = snapshot.organizations.len() + self.declared.len() + 1;
        let mut cursor = Some(start.to_string());
        for _ in 0..limit {
            let Some(current) = cursor else {
                return false;
            };
            if current == ancestor {
                return true;
            }
            cursor = match self.declared.get(&current) {
                Some(parent) => Some(parent.clone()),
                None => snapshot
                    .organization(&current)
                    .and_then(|org| org.parent.clone()),
            };
        }
        false
    }

    pub fn current_parent(&self) -> Option<&str> {
        self.current.as_deref()
    }
}
