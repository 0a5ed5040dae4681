//! In-memory graph store
//!
//! Holds the canonical node and link sets in insertion order. Every
//! mutating operation validates its whole batch before writing anything.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{Error, Result};

use super::node::{Link, MasteryStatus, Node};

/// Canonical owner of concept nodes and the links between them
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    links: Vec<Link>,
    /// node id -> position in `nodes`
    index: HashMap<String, usize>,
}

impl GraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an initial node/link set
    pub fn from_parts(nodes: Vec<Node>, links: Vec<Link>) -> Result<Self> {
        let mut store = Self::new();
        store.append(nodes, links)?;
        Ok(store)
    }

    // ========== Mutations ==========

    /// Append nodes; fails if any id collides with an existing or batch id
    pub fn add_nodes(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.check_nodes(&nodes)?;
        self.push_nodes(nodes);
        Ok(())
    }

    /// Append links; fails if any endpoint is not a stored node
    pub fn add_links(&mut self, links: Vec<Link>) -> Result<()> {
        self.check_links(&links, &HashSet::new())?;
        self.links.extend(links);
        Ok(())
    }

    /// Append nodes and links together; nothing is written unless both batches are valid
    pub fn append(&mut self, nodes: Vec<Node>, links: Vec<Link>) -> Result<()> {
        self.check_append(&nodes, &links)?;
        let (node_count, link_count) = (nodes.len(), links.len());
        self.push_nodes(nodes);
        self.links.extend(links);
        debug!(nodes = node_count, links = link_count, "Graph batch appended");
        Ok(())
    }

    /// Validate an `append` without writing
    pub fn check_append(&self, nodes: &[Node], links: &[Link]) -> Result<()> {
        self.check_nodes(nodes)?;
        let pending: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        self.check_links(links, &pending)
    }

    /// Overwrite one node's status, returning the previous value
    pub fn update_status(&mut self, node_id: &str, status: MasteryStatus) -> Result<MasteryStatus> {
        let position = *self
            .index
            .get(node_id)
            .ok_or_else(|| Error::NodeNotFound(node_id.to_string()))?;
        let node = &mut self.nodes[position];
        let previous = node.status;
        node.status = status;
        Ok(previous)
    }

    // ========== Queries ==========

    /// Every link whose source or target is `node_id`, in insertion order
    pub fn links_touching(&self, node_id: &str) -> Vec<&Link> {
        self.links.iter().filter(|l| l.touches(node_id)).collect()
    }

    /// Ids connected to `node_id`, one entry per link
    pub fn neighbors(&self, node_id: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter_map(|l| l.other_end(node_id))
            .collect()
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node in store order whose category is exactly `category`
    pub fn first_in_category(&self, category: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.category == category)
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .nodes
            .iter()
            .map(|n| n.category.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        categories.sort();
        categories
    }

    // ========== Validation ==========

    fn check_nodes(&self, nodes: &[Node]) -> Result<()> {
        let mut batch: HashSet<&str> = HashSet::with_capacity(nodes.len());
        for node in nodes {
            if node.id.trim().is_empty() {
                return Err(Error::ValidationFailed("node id must not be empty".into()));
            }
            if self.index.contains_key(&node.id) {
                return Err(Error::ValidationFailed(format!(
                    "node id '{}' already exists",
                    node.id
                )));
            }
            if !batch.insert(node.id.as_str()) {
                return Err(Error::ValidationFailed(format!(
                    "node id '{}' appears twice in the batch",
                    node.id
                )));
            }
        }
        Ok(())
    }

    fn check_links(&self, links: &[Link], pending: &HashSet<&str>) -> Result<()> {
        let known = |id: &str| self.index.contains_key(id) || pending.contains(id);
        for link in links {
            for endpoint in [&link.source, &link.target] {
                if !known(endpoint) {
                    return Err(Error::ValidationFailed(format!(
                        "link {} -> {} references unknown node '{}'",
                        link.source, link.target, endpoint
                    )));
                }
            }
        }
        Ok(())
    }

    fn push_nodes(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            self.index.insert(node.id.clone(), self.nodes.len());
            self.nodes.push(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn two_node_store() -> GraphStore {
        GraphStore::from_parts(
            vec![
                Node::new("root", "LLM", "Core"),
                Node::new("c1", "Transformer", "Architecture"),
            ],
            vec![Link::new("root", "c1")],
        )
        .unwrap()
    }

    #[test]
    fn test_add_nodes_rejects_collision_atomically() {
        let mut store = two_node_store();
        let err = store
            .add_nodes(vec![
                Node::new("c2", "Attention", "Concept"),
                Node::new("c1", "Duplicate", "Concept"),
            ])
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.len(), 2);
        assert!(!store.contains("c2"));
    }

    #[test]
    fn test_add_nodes_rejects_duplicate_within_batch() {
        let mut store = GraphStore::new();
        let err = store
            .add_nodes(vec![Node::new("a", "A", "X"), Node::new("a", "A again", "X")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_links_rejects_dangling_endpoint() {
        let mut store = two_node_store();
        let err = store
            .add_links(vec![Link::new("c1", "root"), Link::new("c1", "ghost")])
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.link_count(), 1);
    }

    #[test]
    fn test_duplicate_links_are_allowed() {
        let mut store = two_node_store();
        store.add_links(vec![Link::new("root", "c1")]).unwrap();
        assert_eq!(store.link_count(), 2);
    }

    #[test]
    fn test_append_accepts_links_to_batch_nodes() {
        let mut store = two_node_store();
        store
            .append(
                vec![Node::new("x", "X", "Architecture")],
                vec![Link::new("c1", "x")],
            )
            .unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.link_count(), 2);
    }

    #[test]
    fn test_append_is_all_or_nothing() {
        let mut store = two_node_store();
        let err = store
            .append(
                vec![Node::new("x", "X", "Architecture")],
                vec![Link::new("x", "nowhere")],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.len(), 2);
        assert_eq!(store.link_count(), 1);
        assert!(!store.contains("x"));
    }

    #[test]
    fn test_update_status_touches_only_status() {
        let mut store = two_node_store();
        let before = store.node("c1").unwrap().clone();
        let links_before = store.links().to_vec();

        let previous = store.update_status("c1", MasteryStatus::Known).unwrap();

        let after = store.node("c1").unwrap();
        assert_eq!(previous, MasteryStatus::New);
        assert_eq!(after.status, MasteryStatus::Known);
        assert_eq!(after.label, before.label);
        assert_eq!(after.category, before.category);
        assert_eq!(after.weight, before.weight);
        assert_eq!(store.links(), links_before.as_slice());
    }

    #[test]
    fn test_update_status_missing_node() {
        let mut store = two_node_store();
        let err = store.update_status("ghost", MasteryStatus::Known).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_links_touching_in_insertion_order() {
        let mut store = two_node_store();
        store
            .append(
                vec![Node::new("c2", "Attention", "Concept")],
                vec![Link::new("c1", "c2"), Link::new("c2", "root")],
            )
            .unwrap();

        let touching = store.links_touching("c2");
        assert_eq!(touching.len(), 2);
        assert_eq!(touching[0], &Link::new("c1", "c2"));
        assert_eq!(touching[1], &Link::new("c2", "root"));
        assert_eq!(store.neighbors("c2"), vec!["c1", "root"]);
    }

    #[test]
    fn test_first_in_category_and_categories() {
        let store = two_node_store();
        assert_eq!(store.first_in_category("Architecture").unwrap().id, "c1");
        assert!(store.first_in_category("architecture").is_none());
        assert_eq!(store.categories(), vec!["Architecture", "Core"]);
    }
}
