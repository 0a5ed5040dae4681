//! External service contracts
//!
//! Analysis, quiz generation and assessment are provided by collaborators
//! that may take arbitrarily long and may fail. They only return data; the
//! controller turns that data into graph mutations.

mod llm;

pub use llm::LlmTutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::assessment::AssessmentOutcome;
use crate::domain::merge::CandidateConcept;
use crate::error::Result;

/// Output of analyzing learner-supplied text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Short answer to the learner
    #[serde(default)]
    pub explanation: String,
    pub concepts: Vec<CandidateConcept>,
}

/// One multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }

    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_index
    }
}

/// A quiz about one concept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizContent {
    pub questions: Vec<QuizQuestion>,
}

impl QuizContent {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Turns free text into candidate concepts
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult>;
}

/// Generates a quiz for a concept
#[async_trait]
pub trait QuizService: Send + Sync {
    async fn generate(&self, concept_label: &str) -> Result<QuizContent>;
}

/// Scores a learner's explanation of a concept
#[async_trait]
pub trait AssessmentService: Send + Sync {
    async fn evaluate(&self, concept_label: &str, explanation: &str) -> Result<AssessmentOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_question_helpers() {
        let question = QuizQuestion {
            question: "What does attention weigh?".into(),
            options: vec!["Tokens".into(), "Pixels".into()],
            correct_index: 0,
            explanation: String::new(),
        };
        assert_eq!(question.correct_option(), Some("Tokens"));
        assert!(question.is_correct(0));
        assert!(!question.is_correct(1));
    }

    #[test]
    fn test_analysis_result_defaults() {
        let result: AnalysisResult =
            serde_json::from_str(r#"{"concepts":[{"label":"Softmax","status":"fuzzy"}]}"#)
                .unwrap();
        assert!(result.explanation.is_empty());
        assert_eq!(result.concepts.len(), 1);
    }
}
