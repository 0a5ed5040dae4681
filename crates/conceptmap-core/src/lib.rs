//! Conceptmap Core Library
//!
//! This crate provides the core functionality for Conceptmap, including:
//! - Concept graph with mastery status (append-only, validated)
//! - Three-level folder projection with upsert re-projection
//! - Merge of candidate concepts under a category anchor
//! - Assessment-driven status updates
//! - Request tokens for asynchronous analysis, quiz and assessment calls
//! - Storage (SQLite, per-owner)
//! - LLM integration (OpenRouter API)

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod llm;
pub mod services;
pub mod storage;

pub use error::{Error, ErrorKind, Result};

#[cfg(test)]
mod config_tests;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::controller::{Controller, RequestSlot, Resolution};
    pub use crate::domain::{
        AssessmentOutcome, CandidateConcept, GraphStore, Hierarchy, Link, MasteryStatus,
        MergeReport, Node, PersistenceStore, TreeItem,
    };
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::infrastructure::SqlitePersistenceStore;
    pub use crate::storage::Database;
}
