use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use tracing::{debug, warn};

use crate::acctree::tools::error::Result;
use crate::acctree::tools::io::lines::escape;
use crate::acctree::tools::model::{
    AdminLevel, Association, Limits, Organization, Principal, ROOT_ORGANIZATION, Snapshot,
};
use crate::acctree::tools::tree::{NodeId, OrgTree};

/// Writes the snapshot as a load file, depth first from the root.
pub fn write_snapshot<W: Write>(snapshot: &Snapshot, writer: &mut W) -> Result<()> {
    let tree = OrgTree::build(snapshot);
    for name in tree.detached() {
        warn!(%name, "skipping entry not reachable from the root organization");
    }

    let principals: HashMap<&str, &Principal> = snapshot
        .principals
        .iter()
        .map(|principal| (principal.name.as_str(), principal))
        .collect();

    let root_limits = tree
        .node(OrgTree::ROOT)
        .organization
        .map(|index| &snapshot.organizations[index].limits);
    writeln!(writer, "{}", cluster_line(&snapshot.cluster, root_limits))?;
    writeln!(writer, "{}", parent_line(ROOT_ORGANIZATION))?;

    let mut emitter = Emitter {
        snapshot,
        tree: &tree,
        principals: &principals,
        writer,
    };
    emitter.subtree(OrgTree::ROOT)
}

struct Emitter<'a, W> {
    snapshot: &'a Snapshot,
    tree: &'a OrgTree,
    principals: &'a HashMap<&'a str, &'a Principal>,
    writer: &'a mut W,
}

impl<W: Write> Emitter<'_, W> {
    fn subtree(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        let snapshot = self.snapshot;
        let node = tree.node(id);

        for &member in &node.members {
            let assoc = &snapshot.associations[member];
            let principal = self.principals.get(assoc.principal.as_str()).copied();
            writeln!(self.writer, "{}", user_line(principal, assoc))?;
        }

        for &child in &node.children {
            if let Some(index) = tree.node(child).organization {
                writeln!(self.writer, "{}", account_line(&snapshot.organizations[index]))?;
            }
        }

        for &child in &node.children {
            if tree.has_descendants(child) {
                debug!(path = %tree.path(child).join("/"), "writing parent block");
                writeln!(self.writer, "{}", parent_line(&tree.node(child).name))?;
                self.subtree(child)?;
            }
        }
        Ok(())
    }
}

/// Quotes a value, escaping comment, quote and backslash characters.
pub fn quote(value: &str) -> String {
    format!("'{}'", escape(value))
}

pub fn cluster_line(cluster: &str, limits: Option<&Limits>) -> String {
    let mut line = format!("Cluster - {}", quote(cluster));
    if let Some(limits) = limits {
        push_limits(&mut line, limits);
    }
    line
}

pub fn parent_line(organization: &str) -> String {
    format!("Parent - {}", quote(organization))
}

pub fn account_line(org: &Organization) -> String {
    let mut line = format!("Account - {}", quote(&org.name));
    push_field(&mut line, "Description", &quote(&org.description));
    push_field(&mut line, "Organization", &quote(&org.org_string));
    push_limits(&mut line, &org.limits);
    line
}

/// Renders a binding. Principal-level fields are repeated on every binding of
/// the same principal.
pub fn user_line(principal: Option<&Principal>, assoc: &Association) -> String {
    let mut line = format!("User - {}", quote(&assoc.principal));
    if let Some(principal) = principal {
        push_field(&mut line, "DefaultAccount", &quote(&principal.default_org));
        if principal.admin_level != AdminLevel::None {
            push_field(
                &mut line,
                "AdminLevel",
                &quote(&principal.admin_level.to_string()),
            );
        }
        if !principal.coordinator_of.is_empty() {
            push_field(&mut line, "Coordinator", &quote(&join(&principal.coordinator_of)));
        }
    }
    if let Some(partition) = &assoc.partition {
        push_field(&mut line, "Partition", &quote(partition));
    }
    push_limits(&mut line, &assoc.limits);
    line
}

fn push_limits(line: &mut String, limits: &Limits) {
    for (kind, value) in &limits.values {
        push_field(line, kind.key(), &value.to_string());
    }
    if !limits.qos.is_empty() {
        push_field(line, "QOS", &quote(&join(&limits.qos)));
    }
    if let Some(default_qos) = &limits.default_qos {
        push_field(line, "DefaultQOS", &quote(default_qos));
    }
}

fn push_field(line: &mut String, key: &str, value: &str) {
    line.push(':');
    line.push_str(key);
    line.push('=');
    line.push_str(value);
}

fn join(items: &BTreeSet<String>) -> String {
    items.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
