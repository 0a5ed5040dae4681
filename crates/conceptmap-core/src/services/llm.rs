//! LLM-backed tutor
//!
//! Implements analysis, quiz generation and assessment by prompting for a
//! JSON object and parsing it leniently. Anything that cannot be parsed
//! becomes an external service error.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AnalysisResult, AnalysisService, AssessmentService, QuizContent, QuizQuestion, QuizService};
use crate::config::LlmConfig;
use crate::domain::assessment::AssessmentOutcome;
use crate::domain::graph::MasteryStatus;
use crate::domain::merge::CandidateConcept;
use crate::error::{Error, Result};
use crate::llm::{LlmClient, Message};

/// Maximum learner text sent in one prompt
const MAX_INPUT_CHARS: usize = 6000;

const ANALYSIS_PROMPT: &str = r#"You are a patient tutor helping a learner map what they know.
Answer the learner's question briefly, then list the key concepts it involves.

Respond with JSON only:
{
  "explanation": "short answer in plain language",
  "concepts": [
    {"label": "concept name", "status": "known|fuzzy|unknown|new", "description": "one sentence"}
  ]
}

Use "new" when you cannot tell how well the learner knows a concept. List 2 to 6 concepts."#;

const QUIZ_PROMPT: &str = r#"You write short multiple-choice quizzes that check real understanding.

Respond with JSON only:
{
  "questions": [
    {
      "question": "...",
      "options": ["...", "...", "...", "..."],
      "correct_index": 0,
      "explanation": "why the correct option is right"
    }
  ]
}

Write 3 questions with 4 options each."#;

const ASSESSMENT_PROMPT: &str = r#"You assess a learner's own explanation of a concept.
Score how accurate and complete it is from 0 to 100 and classify mastery:
- "known": accurate and complete (score 80 or more)
- "fuzzy": partly right or missing key ideas
- "unknown": mostly wrong or empty

Respond with JSON only:
{"score": 0, "status": "known|fuzzy|unknown", "feedback": "...", "next_step": "..."}"#;

/// Tutor that implements every external service through one LLM client
#[derive(Debug, Clone)]
pub struct LlmTutor {
    client: LlmClient,
}

impl LlmTutor {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Build from configuration and the API key in the environment
    ///
    /// Returns `Ok(None)` when no key is set.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let key = config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        match key {
            Some(key) => Ok(Some(Self::new(LlmClient::new(config.clone(), key)?))),
            None => Ok(None),
        }
    }

    async fn ask(&self, service: &'static str, system: &str, user: String) -> Result<String> {
        let messages = vec![Message::system(system), Message::user(user)];
        match self.client.complete_json(messages).await {
            Ok(response) => Ok(response.content),
            Err(e) => {
                warn!(service = service, error = %e, "Tutor request failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AnalysisService for LlmTutor {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::ValidationFailed("Nothing to analyze".to_string()));
        }
        let content = self
            .ask("analysis", ANALYSIS_PROMPT, truncate_content(text, MAX_INPUT_CHARS))
            .await?;
        parse_analysis(&content)
    }
}

#[async_trait]
impl QuizService for LlmTutor {
    async fn generate(&self, concept_label: &str) -> Result<QuizContent> {
        let content = self
            .ask("quiz", QUIZ_PROMPT, format!("Concept: {}", concept_label))
            .await?;
        parse_quiz(&content)
    }
}

#[async_trait]
impl AssessmentService for LlmTutor {
    async fn evaluate(&self, concept_label: &str, explanation: &str) -> Result<AssessmentOutcome> {
        let user = format!(
            "Concept: {}\n\nLearner's explanation:\n{}",
            concept_label,
            truncate_content(explanation.trim(), MAX_INPUT_CHARS)
        );
        let content = self.ask("assessment", ASSESSMENT_PROMPT, user).await?;
        parse_assessment(&content)
    }
}

// ========== Response parsing ==========

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    concepts: Vec<RawConcept>,
}

#[derive(Deserialize)]
struct RawConcept {
    #[serde(alias = "name")]
    label: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct RawQuiz {
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    #[serde(alias = "correctIndex", alias = "answer_index")]
    correct_index: usize,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize)]
struct RawAssessment {
    score: f64,
    status: String,
    #[serde(default)]
    feedback: String,
    #[serde(default, alias = "nextStep")]
    next_step: String,
}

fn parse_analysis(content: &str) -> Result<AnalysisResult> {
    let raw: RawAnalysis = serde_json::from_str(&extract_json_from_response(content))
        .map_err(|e| Error::external("analysis", format!("Unparseable response: {}", e)))?;

    let concepts: Vec<CandidateConcept> = raw
        .concepts
        .into_iter()
        .filter(|c| !c.label.trim().is_empty())
        .map(|c| CandidateConcept {
            label: c.label.trim().to_string(),
            status: c
                .status
                .as_deref()
                .and_then(MasteryStatus::parse)
                .unwrap_or(MasteryStatus::New),
            description: c.description.filter(|d| !d.trim().is_empty()),
        })
        .collect();

    if concepts.is_empty() {
        return Err(Error::external("analysis", "Response contained no concepts"));
    }

    debug!(concepts = concepts.len(), "Analysis parsed");
    Ok(AnalysisResult {
        explanation: raw.explanation.trim().to_string(),
        concepts,
    })
}

fn parse_quiz(content: &str) -> Result<QuizContent> {
    let raw: RawQuiz = serde_json::from_str(&extract_json_from_response(content))
        .map_err(|e| Error::external("quiz", format!("Unparseable response: {}", e)))?;

    let questions: Vec<QuizQuestion> = raw
        .questions
        .into_iter()
        .filter(|q| q.options.len() >= 2 && q.correct_index < q.options.len())
        .map(|q| QuizQuestion {
            question: q.question,
            options: q.options,
            correct_index: q.correct_index,
            explanation: q.explanation,
        })
        .collect();

    if questions.is_empty() {
        return Err(Error::external("quiz", "Response contained no usable questions"));
    }
    Ok(QuizContent { questions })
}

fn parse_assessment(content: &str) -> Result<AssessmentOutcome> {
    let raw: RawAssessment = serde_json::from_str(&extract_json_from_response(content))
        .map_err(|e| Error::external("assessment", format!("Unparseable response: {}", e)))?;

    let status = MasteryStatus::parse(&raw.status).ok_or_else(|| {
        Error::external("assessment", format!("Unknown status '{}'", raw.status))
    })?;

    Ok(AssessmentOutcome {
        score: raw.score.round().clamp(0.0, 100.0) as u8,
        status,
        feedback: raw.feedback,
        next_step: raw.next_step,
    })
}

/// Truncate to at most `max_chars` characters
fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}

/// Extract JSON from a response that might contain markdown or other text
fn extract_json_from_response(response: &str) -> String {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        if let Some(newline) = response[potential_start..].find('\n') {
            let json_start = potential_start + newline + 1;
            if let Some(end) = response[json_start..].find("```") {
                return response[json_start..json_start + end].trim().to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}'))
        && start < end
    {
        return response[start..=end].to_string();
    }

    response.to_string()
}
