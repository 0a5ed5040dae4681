//! Merge inputs

use serde::{Deserialize, Serialize};

use crate::domain::graph::{MasteryStatus, canonicalize};

/// A concept proposed by analysis, possibly edited by the learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateConcept {
    pub label: String,
    #[serde(default)]
    pub status: MasteryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CandidateConcept {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: MasteryStatus::New,
            description: None,
        }
    }

    pub fn with_status(mut self, status: MasteryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn canonical_label(&self) -> String {
        canonicalize(&self.label)
    }
}

/// Handling of candidates whose label already exists in the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Merge every candidate, duplicates included
    #[default]
    Allow,
    /// Drop candidates matching an existing node or an earlier candidate
    SkipExisting,
    /// Fail the whole merge if any candidate matches
    RejectExisting,
}

impl DedupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::SkipExisting => "skip_existing",
            Self::RejectExisting => "reject_existing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "skip_existing" => Some(Self::SkipExisting),
            "reject_existing" => Some(Self::RejectExisting),
            _ => None,
        }
    }

    pub fn all() -> &'static [DedupPolicy] {
        &[Self::Allow, Self::SkipExisting, Self::RejectExisting]
    }
}

impl std::fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        for policy in DedupPolicy::all() {
            assert_eq!(DedupPolicy::parse(policy.as_str()), Some(*policy));
        }
        assert_eq!(DedupPolicy::parse(" Skip_Existing "), Some(DedupPolicy::SkipExisting));
        assert_eq!(DedupPolicy::parse("merge"), None);
    }

    #[test]
    fn test_candidate_deserializes_with_defaults() {
        let candidate: CandidateConcept = serde_json::from_str(r#"{"label":"Tokenizer"}"#).unwrap();
        assert_eq!(candidate.status, MasteryStatus::New);
        assert!(candidate.description.is_none());
    }
}
