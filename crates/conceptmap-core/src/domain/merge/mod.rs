//! Merging analyzed concepts into the graph

mod candidate;
mod merger;

pub use candidate::{CandidateConcept, DedupPolicy};
pub use merger::{ConceptMerger, MergePlan, MergeReport};
