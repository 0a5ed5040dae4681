//! Concept merger
//!
//! Turns a batch of candidates plus a target category into new nodes and
//! the links that attach them to the graph. Planning is pure; committing
//! appends the planned batch through [`GraphStore::append`], which rejects
//! the whole batch on any invariant violation.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::candidate::{CandidateConcept, DedupPolicy};
use crate::config::MergeConfig;
use crate::domain::graph::{GraphStore, Link, MasteryStatus, Node};
use crate::error::{Error, Result};

/// Nodes and links a merge would write
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub category: String,
    /// New nodes, sentinel root first when one is synthesized
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    /// Node the new chain hangs off; `None` when every candidate was skipped
    pub anchor_id: Option<String>,
    pub sentinel_created: bool,
    /// Labels dropped by the dedup policy
    pub skipped: Vec<String>,
}

impl MergePlan {
    /// Ids of the concept nodes created from candidates
    pub fn concept_ids(&self) -> Vec<String> {
        let skip = usize::from(self.sentinel_created);
        self.nodes.iter().skip(skip).map(|n| n.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Outcome of a committed merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub category: String,
    pub created: Vec<String>,
    pub link_count: usize,
    pub anchor_id: Option<String>,
    pub sentinel_created: bool,
    pub skipped: Vec<String>,
}

/// Builds and commits concept merges
#[derive(Debug, Clone)]
pub struct ConceptMerger {
    default_weight: f64,
    dedup: DedupPolicy,
    sentinel_root_id: String,
    sentinel_label: String,
}

impl Default for ConceptMerger {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

impl ConceptMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            default_weight: config.default_weight,
            dedup: config.dedup,
            sentinel_root_id: config.sentinel_root_id.clone(),
            sentinel_label: config.sentinel_label.clone(),
        }
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_default_weight(mut self, weight: f64) -> Self {
        self.default_weight = weight;
        self
    }

    pub fn dedup(&self) -> DedupPolicy {
        self.dedup
    }

    /// Compute the nodes and links for merging `candidates` under `category`
    pub fn plan(
        &self,
        store: &GraphStore,
        candidates: &[CandidateConcept],
        category: &str,
    ) -> Result<MergePlan> {
        let category = category.trim();
        if category.is_empty() {
            return Err(Error::ValidationFailed(
                "Target category cannot be empty".to_string(),
            ));
        }
        if candidates.is_empty() {
            return Err(Error::ValidationFailed(
                "No concepts to merge".to_string(),
            ));
        }
        if let Some(position) = candidates.iter().position(|c| c.label.trim().is_empty()) {
            return Err(Error::ValidationFailed(format!(
                "Concept #{} has an empty label",
                position + 1
            )));
        }

        let (accepted, skipped) = self.apply_dedup(store, candidates)?;

        let mut nodes: Vec<Node> = accepted
            .iter()
            .map(|candidate| self.synthesize(candidate, category))
            .collect();

        if nodes.is_empty() {
            debug!(category = %category, skipped = skipped.len(), "Merge planned with nothing to add");
            return Ok(MergePlan {
                category: category.to_string(),
                nodes,
                links: Vec::new(),
                anchor_id: None,
                sentinel_created: false,
                skipped,
            });
        }

        let (anchor_id, sentinel) = match store
            .first_in_category(category)
            .or_else(|| store.nodes().first())
        {
            Some(anchor) => (anchor.id.clone(), None),
            None => {
                let sentinel = Node::new(&self.sentinel_root_id, &self.sentinel_label, category)
                    .with_status(MasteryStatus::New)
                    .with_weight(self.default_weight);
                (self.sentinel_root_id.clone(), Some(sentinel))
            }
        };

        let mut links = Vec::with_capacity(nodes.len());
        links.push(Link::new(&anchor_id, &nodes[0].id));
        links.extend(
            nodes
                .windows(2)
                .map(|pair| Link::new(&pair[0].id, &pair[1].id)),
        );

        let sentinel_created = sentinel.is_some();
        if let Some(sentinel) = sentinel {
            nodes.insert(0, sentinel);
        }

        info!(
            category = %category,
            anchor_id = %anchor_id,
            nodes = nodes.len(),
            links = links.len(),
            sentinel = sentinel_created,
            "Merge planned"
        );

        Ok(MergePlan {
            category: category.to_string(),
            nodes,
            links,
            anchor_id: Some(anchor_id),
            sentinel_created,
            skipped,
        })
    }

    /// Write a plan to the store, all-or-nothing
    pub fn commit(store: &mut GraphStore, plan: MergePlan) -> Result<MergeReport> {
        let created = plan.concept_ids();
        let link_count = plan.links.len();

        if let Err(e) = store.append(plan.nodes, plan.links) {
            warn!(category = %plan.category, error = %e, "Merge rejected");
            return Err(e);
        }

        info!(
            category = %plan.category,
            created = created.len(),
            links = link_count,
            "Merge committed"
        );

        Ok(MergeReport {
            category: plan.category,
            created,
            link_count,
            anchor_id: plan.anchor_id,
            sentinel_created: plan.sentinel_created,
            skipped: plan.skipped,
        })
    }

    /// Plan and commit in one step
    pub fn merge(
        &self,
        store: &mut GraphStore,
        candidates: &[CandidateConcept],
        category: &str,
    ) -> Result<MergeReport> {
        let plan = self.plan(store, candidates, category)?;
        Self::commit(store, plan)
    }

    fn apply_dedup<'a>(
        &self,
        store: &GraphStore,
        candidates: &'a [CandidateConcept],
    ) -> Result<(Vec<&'a CandidateConcept>, Vec<String>)> {
        if self.dedup == DedupPolicy::Allow {
            return Ok((candidates.iter().collect(), Vec::new()));
        }

        let mut seen: HashSet<String> = store
            .nodes()
            .iter()
            .map(Node::canonical_label)
            .filter(|key| !key.is_empty())
            .collect();
        let mut accepted = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();

        for candidate in candidates {
            let key = candidate.canonical_label();
            // punctuation-only labels have no comparable form
            if key.is_empty() || seen.insert(key) {
                accepted.push(candidate);
                continue;
            }
            match self.dedup {
                DedupPolicy::RejectExisting => {
                    return Err(Error::DuplicateConcept(candidate.label.trim().to_string()));
                }
                _ => skipped.push(candidate.label.trim().to_string()),
            }
        }

        Ok((accepted, skipped))
    }

    fn synthesize(&self, candidate: &CandidateConcept, category: &str) -> Node {
        let mut node = Node::new(
            format!("concept-{}", Uuid::new_v4()),
            candidate.label.trim(),
            category,
        )
        .with_status(candidate.status)
        .with_weight(self.default_weight);
        node.description = candidate.description.clone();
        node
    }
}
