//! Applying assessment outcomes to mastery status

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::graph::{GraphStore, MasteryStatus};
use crate::error::{Error, Result};

/// Result of scoring a learner's explanation of a concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    /// 0 to 100
    pub score: u8,
    pub status: MasteryStatus,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub next_step: String,
}

impl AssessmentOutcome {
    pub fn new(score: u8, status: MasteryStatus) -> Self {
        Self {
            score,
            status,
            feedback: String::new(),
            next_step: String::new(),
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    pub fn with_next_step(mut self, next_step: impl Into<String>) -> Self {
        self.next_step = next_step.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.score > 100 {
            return Err(Error::ValidationFailed(format!(
                "Score {} is outside 0-100",
                self.score
            )));
        }
        Ok(())
    }
}

/// Applies an assessment outcome to one node
pub struct StatusUpdater;

impl StatusUpdater {
    /// Set the node's status from `outcome`, returning the previous status
    pub fn apply(
        store: &mut GraphStore,
        node_id: &str,
        outcome: &AssessmentOutcome,
    ) -> Result<MasteryStatus> {
        outcome.validate()?;
        let previous = store.update_status(node_id, outcome.status)?;
        info!(
            node_id = %node_id,
            from = %previous,
            to = %outcome.status,
            score = outcome.score,
            "Mastery status applied"
        );
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{seed_links, seed_nodes};
    use crate::error::ErrorKind;

    #[test]
    fn test_apply_changes_only_status() {
        let mut store = GraphStore::from_parts(seed_nodes(), seed_links()).unwrap();
        let before = store.clone();

        let outcome = AssessmentOutcome::new(92, MasteryStatus::Known)
            .with_feedback("Clear explanation")
            .with_next_step("Try multi-head attention");
        let previous = StatusUpdater::apply(&mut store, "c2", &outcome).unwrap();

        assert_eq!(previous, MasteryStatus::Unknown);
        assert_eq!(store.links(), before.links());
        for (after, before) in store.nodes().iter().zip(before.nodes()) {
            if after.id == "c2" {
                assert_eq!(after.status, MasteryStatus::Known);
                let mut restored = after.clone();
                restored.status = before.status;
                assert_eq!(&restored, before);
            } else {
                assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn test_apply_missing_node() {
        let mut store = GraphStore::new();
        let err = StatusUpdater::apply(
            &mut store,
            "ghost",
            &AssessmentOutcome::new(10, MasteryStatus::Unknown),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_score_out_of_range() {
        let mut store = GraphStore::from_parts(seed_nodes(), seed_links()).unwrap();
        let err = StatusUpdater::apply(
            &mut store,
            "c1",
            &AssessmentOutcome::new(101, MasteryStatus::Known),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.node("c1").unwrap().status, MasteryStatus::Fuzzy);
    }
}
