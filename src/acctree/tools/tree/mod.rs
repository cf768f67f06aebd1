//! Arena view of a snapshot's organization hierarchy.
//!
//! Nodes refer to their parent by index and own a child index list that is
//! built once, sorted by name. Records stay in the snapshot; nodes hold indices
//! into its vectors.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::acctree::tools::model::{ROOT_ORGANIZATION, Snapshot};

/// Index of a node inside an [`OrgTree`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgNode {
    pub name: String,
    /// Index into [`Snapshot::organizations`]; `None` for a root the snapshot
    /// does not list explicitly.
    pub organization: Option<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Indices into [`Snapshot::associations`] bound to this organization.
    pub members: Vec<usize>,
}

/// Organization hierarchy built from a flat snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgTree {
    nodes: Vec<OrgNode>,
    detached: Vec<String>,
}

impl OrgTree {
    pub const ROOT: NodeId = 0;

    pub fn build(snapshot: &Snapshot) -> Self {
        let mut nodes = vec![OrgNode {
            name: ROOT_ORGANIZATION.to_string(),
            organization: snapshot
                .organizations
                .iter()
                .position(|org| org.name == ROOT_ORGANIZATION),
            parent: None,
            children: Vec::new(),
            members: Vec::new(),
        }];
        let mut by_name: HashMap<&str, NodeId> = HashMap::new();
        by_name.insert(ROOT_ORGANIZATION, Self::ROOT);

        for (index, org) in snapshot.organizations.iter().enumerate() {
            if by_name.contains_key(org.name.as_str()) {
                continue;
            }
            by_name.insert(org.name.as_str(), nodes.len());
            nodes.push(OrgNode {
                name: org.name.clone(),
                organization: Some(index),
                parent: None,
                children: Vec::new(),
                members: Vec::new(),
            });
        }

        for id in 1..nodes.len() {
            let parent_name = nodes[id]
                .organization
                .and_then(|index| snapshot.organizations[index].parent.as_deref())
                .unwrap_or(ROOT_ORGANIZATION);
            if let Some(&parent) = by_name.get(parent_name) {
                nodes[id].parent = Some(parent);
            }
        }

        let reachable = reachable_from_root(&nodes);
        let mut detached = Vec::new();
        for id in 1..nodes.len() {
            let parent = nodes[id].parent;
            match parent {
                Some(parent) if reachable.contains(&id) => nodes[parent].children.push(id),
                _ => detached.push(nodes[id].name.clone()),
            }
        }

        for (index, assoc) in snapshot.associations.iter().enumerate() {
            match by_name.get(assoc.organization.as_str()) {
                Some(&id) if reachable.contains(&id) => nodes[id].members.push(index),
                _ => detached.push(format!("{}/{}", assoc.principal, assoc.organization)),
            }
        }

        let names: Vec<String> = nodes.iter().map(|node| node.name.clone()).collect();
        for node in &mut nodes {
            node.children.sort_by(|lhs, rhs| names[*lhs].cmp(&names[*rhs]));
            node.members.sort_by(|lhs, rhs| {
                let lhs = &snapshot.associations[*lhs];
                let rhs = &snapshot.associations[*rhs];
                (&lhs.principal, &lhs.partition).cmp(&(&rhs.principal, &rhs.partition))
            });
        }

        Self { nodes, detached }
    }

    pub fn node(&self, id: NodeId) -> &OrgNode {
        &self.nodes[id]
    }

    /// Node for the organization `name`, reachable or not.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// Organizations and bindings that cannot be reached from the root,
    /// because their parent is missing or they sit on a cycle.
    pub fn detached(&self) -> &[String] {
        &self.detached
    }

    /// Whether a `Parent` block is needed for this node.
    pub fn has_descendants(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        !node.children.is_empty() || !node.members.is_empty()
    }

    /// Names from the root down to `id`, inclusive. For a node on a cycle the
    /// walk stops once every node has been visited.
    pub fn path(&self, id: NodeId) -> Vec<&str> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if path.len() == self.nodes.len() {
                break;
            }
            path.push(self.nodes[current].name.as_str());
            cursor = self.nodes[current].parent;
        }
        path.reverse();
        path
    }
}

fn reachable_from_root(nodes: &[OrgNode]) -> HashSet<NodeId> {
    let mut children: Vec<Vec<NodeId>> = vec![Vec::new(); nodes.len()];
    for (id, node) in nodes.iter().enumerate().skip(1) {
        if let Some(parent) = node.parent {
            children[parent].push(id);
        }
    }

    let mut reachable = HashSet::new();
    let mut queue = VecDeque::from([OrgTree::ROOT]);
    while let Some(id) = queue.pop_front() {
        if reachable.insert(id) {
            queue.extend(children[id].iter().copied());
        }
    }
    reachable
}
