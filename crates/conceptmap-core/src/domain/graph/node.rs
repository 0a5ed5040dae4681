//! Concept nodes and links
//!
//! Nodes are the learnable units of the graph. Links connect two nodes and
//! carry no identity of their own; their direction only matters for display.

use serde::{Deserialize, Serialize};

/// How well the learner knows a concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryStatus {
    /// Understood and explainable
    Known,
    /// Partially understood
    Fuzzy,
    /// Not understood
    Unknown,
    /// Just added, not yet assessed
    #[default]
    New,
}

impl MasteryStatus {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Known => "known",
            Self::Fuzzy => "fuzzy",
            Self::Unknown => "unknown",
            Self::New => "new",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "known" => Some(Self::Known),
            "fuzzy" => Some(Self::Fuzzy),
            "unknown" => Some(Self::Unknown),
            "new" => Some(Self::New),
            _ => None,
        }
    }

    /// Get all statuses
    pub fn all() -> &'static [MasteryStatus] {
        &[Self::Known, Self::Fuzzy, Self::Unknown, Self::New]
    }
}

impl std::fmt::Display for MasteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single concept in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable unique identifier
    pub id: String,
    /// Display text
    pub label: String,
    /// Current mastery status
    pub status: MasteryStatus,
    /// Presentation size only
    pub weight: f64,
    /// Grouping key for the folder tree
    pub category: String,
    /// Optional explanation of the concept
    pub description: Option<String>,
}

impl Node {
    /// Create a new node with status `new` and weight 1
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: MasteryStatus::New,
            weight: 1.0,
            category: category.into(),
            description: None,
        }
    }

    /// Set the status
    pub fn with_status(mut self, status: MasteryStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Canonical form of the label, used for duplicate detection
    pub fn canonical_label(&self) -> String {
        canonicalize(&self.label)
    }
}

/// A connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Whether either endpoint is `node_id`
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// The endpoint opposite to `node_id`, if the link touches it
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.source == node_id {
            Some(&self.target)
        } else if self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Canonicalize a label for deduplication
///
/// Lowercases, keeps alphanumerics and whitespace, collapses whitespace.
pub fn canonicalize(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let node = Node::new("c1", "Transformer", "Architecture")
            .with_status(MasteryStatus::Fuzzy)
            .with_weight(25.0)
            .with_description("Attention-based architecture");

        assert_eq!(node.id, "c1");
        assert_eq!(node.status, MasteryStatus::Fuzzy);
        assert_eq!(node.weight, 25.0);
        assert_eq!(node.description.as_deref(), Some("Attention-based architecture"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(MasteryStatus::parse("known"), Some(MasteryStatus::Known));
        assert_eq!(MasteryStatus::parse(" FUZZY "), Some(MasteryStatus::Fuzzy));
        assert_eq!(MasteryStatus::parse("new"), Some(MasteryStatus::New));
        assert_eq!(MasteryStatus::parse("mastered"), None);
        for status in MasteryStatus::all() {
            assert_eq!(MasteryStatus::parse(status.as_str()), Some(*status));
        }
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        let json = serde_json::to_string(&MasteryStatus::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }

    #[test]
    fn test_link_endpoints() {
        let link = Link::new("root", "c1");
        assert!(link.touches("root"));
        assert!(link.touches("c1"));
        assert!(!link.touches("c2"));
        assert_eq!(link.other_end("c1"), Some("root"));
        assert_eq!(link.other_end("c2"), None);
    }

    #[test]
    fn test_canonicalization() {
        assert_eq!(canonicalize("Vector DB"), "vector db");
        assert_eq!(canonicalize("Fine-tuning"), "finetuning");
        assert_eq!(canonicalize("  RAG   (retrieval) "), "rag retrieval");
    }
}
