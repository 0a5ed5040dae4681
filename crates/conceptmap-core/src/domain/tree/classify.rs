//! Subject bucket classification
//!
//! Table-driven, case-insensitive substring match. Rules are evaluated in
//! order and the first rule with a matching keyword wins; categories that
//! match no rule fall into General Knowledge.

use serde::{Deserialize, Serialize};

/// Top-level subject grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    ComputerScience,
    Mathematics,
    GeneralKnowledge,
}

/// Ordered (bucket, keywords) rules. General Knowledge is the fallback.
const BUCKET_RULES: &[(Bucket, &[&str])] = &[
    (
        Bucket::ComputerScience,
        &[
            "core",
            "architecture",
            "infrastructure",
            "skill",
            "training",
            "ai",
            "data",
        ],
    ),
    (Bucket::Mathematics, &["math", "concept", "theory"]),
];

impl Bucket {
    /// Buckets in display order
    pub fn all() -> &'static [Bucket] {
        &[
            Self::ComputerScience,
            Self::Mathematics,
            Self::GeneralKnowledge,
        ]
    }

    /// Stable folder id of the bucket
    pub fn folder_id(&self) -> &'static str {
        match self {
            Self::ComputerScience => "bucket:computer-science",
            Self::Mathematics => "bucket:mathematics",
            Self::GeneralKnowledge => "bucket:general-knowledge",
        }
    }

    /// Default display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ComputerScience => "Computer Science",
            Self::Mathematics => "Mathematics",
            Self::GeneralKnowledge => "General Knowledge",
        }
    }

    /// Whether the bucket folder starts open
    pub fn default_open(&self) -> bool {
        !matches!(self, Self::Mathematics)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Classify a category string into its bucket
pub fn classify(category: &str) -> Bucket {
    let lower = category.to_lowercase();
    BUCKET_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(bucket, _)| *bucket)
        .unwrap_or(Bucket::GeneralKnowledge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_categories() {
        assert_eq!(classify("Core"), Bucket::ComputerScience);
        assert_eq!(classify("Architecture"), Bucket::ComputerScience);
        assert_eq!(classify("Infrastructure"), Bucket::ComputerScience);
        assert_eq!(classify("Training"), Bucket::ComputerScience);
        assert_eq!(classify("Skill"), Bucket::ComputerScience);
        assert_eq!(classify("Concept"), Bucket::Mathematics);
        assert_eq!(classify("Math"), Bucket::Mathematics);
        assert_eq!(classify("Application"), Bucket::GeneralKnowledge);
    }

    #[test]
    fn test_case_insensitive_substring() {
        assert_eq!(classify("BIG DATA"), Bucket::ComputerScience);
        assert_eq!(classify("Number Theory"), Bucket::Mathematics);
        assert_eq!(classify("mathematics"), Bucket::Mathematics);
    }

    #[test]
    fn test_first_rule_wins() {
        // contains both "data" and "theory"
        assert_eq!(classify("Data Theory"), Bucket::ComputerScience);
        // "ai" hides inside "Explain"
        assert_eq!(classify("Explain"), Bucket::ComputerScience);
    }

    #[test]
    fn test_fallback_and_determinism() {
        for category in ["History", "", "Cooking", "Concept Art", "AI Ethics"] {
            assert_eq!(classify(category), classify(category));
        }
        assert_eq!(classify("History"), Bucket::GeneralKnowledge);
        assert_eq!(classify(""), Bucket::GeneralKnowledge);
    }

    #[test]
    fn test_bucket_defaults() {
        assert!(Bucket::ComputerScience.default_open());
        assert!(!Bucket::Mathematics.default_open());
        assert!(Bucket::GeneralKnowledge.default_open());
        assert_eq!(Bucket::all().len(), 3);
    }
}
