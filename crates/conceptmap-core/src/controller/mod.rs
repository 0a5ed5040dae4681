//! Application controller
//!
//! Owns the graph store, the projected hierarchy and all session state.
//! Every graph change goes through one of the domain components and is
//! followed by an upsert re-projection. External services never touch the
//! state directly: requests are issued with a token, the service call runs
//! without borrowing the controller, and the response is resolved against
//! the latest token for its slot.

mod requests;

pub use requests::{RequestSlot, RequestToken, RequestTracker, Resolution};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::assessment::{AssessmentOutcome, StatusUpdater};
use crate::domain::graph::{GraphStore, MasteryStatus, Node, seed_links, seed_nodes};
use crate::domain::merge::{CandidateConcept, ConceptMerger, MergeReport};
use crate::domain::persistence::{AssessmentRecord, ChatMessage, NodeContent, PersistenceStore};
use crate::domain::tree::{HiddenCategories, Hierarchy, TreeMutator, TreeProjector};
use crate::error::{Error, Result};
use crate::services::{AnalysisResult, AnalysisService, AssessmentService, QuizContent, QuizService};

/// An issued analysis request
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub token: RequestToken,
    pub text: String,
}

/// An issued quiz request for the selected node
#[derive(Debug, Clone, Serialize)]
pub struct QuizRequest {
    pub token: RequestToken,
    pub node_id: String,
    pub concept_label: String,
}

/// An issued assessment request for the selected node
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRequest {
    pub token: RequestToken,
    pub node_id: String,
    pub concept_label: String,
    pub explanation: String,
}

/// Write-through persistence scoped to one owner
#[derive(Clone)]
struct Attached {
    store: Arc<dyn PersistenceStore>,
    owner: String,
}

/// Single owner of the concept graph and its derived views
pub struct Controller {
    config: Config,
    store: GraphStore,
    hierarchy: Hierarchy,
    projector: TreeProjector,
    merger: ConceptMerger,
    hidden: HiddenCategories,
    selected: Option<String>,
    pending: Option<AnalysisResult>,
    quiz: Option<QuizContent>,
    last_assessment: Option<AssessmentOutcome>,
    tracker: RequestTracker,
    analysis_service: Option<Arc<dyn AnalysisService>>,
    quiz_service: Option<Arc<dyn QuizService>>,
    assessment_service: Option<Arc<dyn AssessmentService>>,
    persistence: Option<Attached>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("nodes", &self.store.len())
            .field("links", &self.store.link_count())
            .field("selected", &self.selected)
            .field("pending", &self.pending.is_some())
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

impl Controller {
    // ========== Construction ==========

    /// Controller over an empty graph
    pub fn new(config: Config) -> Self {
        Self::from_store(config, GraphStore::new())
    }

    /// Controller over the starter graph
    pub fn with_seed(config: Config) -> Result<Self> {
        let store = GraphStore::from_parts(seed_nodes(), seed_links())?;
        Ok(Self::from_store(config, store))
    }

    /// Controller over the graph persisted for `owner`
    pub async fn load(
        config: Config,
        persistence: Arc<dyn PersistenceStore>,
        owner: impl Into<String>,
    ) -> Result<Self> {
        let owner = owner.into();
        let (nodes, links) = persistence.load_graph(&owner).await?;
        let store = GraphStore::from_parts(nodes, links)?;
        info!(owner_id = %owner, nodes = store.len(), links = store.link_count(), "Graph loaded");
        Ok(Self::from_store(config, store).with_persistence(persistence, owner))
    }

    /// Write the starter graph for `owner` and return a controller over it
    ///
    /// Fails if the owner already has a graph, unless `force` clears it first.
    pub async fn init(
        config: Config,
        persistence: Arc<dyn PersistenceStore>,
        owner: impl Into<String>,
        force: bool,
    ) -> Result<Self> {
        let owner = owner.into();
        let (existing, _) = persistence.load_graph(&owner).await?;
        if !existing.is_empty() {
            if !force {
                return Err(Error::ValidationFailed(format!(
                    "A graph with {} concepts already exists for '{}'",
                    existing.len(),
                    owner
                )));
            }
            persistence.clear_all(&owner).await?;
        }

        let controller = Self::with_seed(config)?;
        persistence
            .append_graph(&owner, controller.store.nodes(), controller.store.links())
            .await?;
        info!(owner_id = %owner, nodes = controller.store.len(), "Starter graph written");
        Ok(controller.with_persistence(persistence, owner))
    }

    fn from_store(config: Config, store: GraphStore) -> Self {
        let projector = TreeProjector::from_config(&config.tree);
        let merger = ConceptMerger::from_config(&config.merge);
        let hierarchy = projector.project(&store);
        Self {
            config,
            store,
            hierarchy,
            projector,
            merger,
            hidden: HiddenCategories::new(),
            selected: None,
            pending: None,
            quiz: None,
            last_assessment: None,
            tracker: RequestTracker::new(),
            analysis_service: None,
            quiz_service: None,
            assessment_service: None,
            persistence: None,
        }
    }

    /// Write merges, status changes and history through to `store`
    pub fn with_persistence(
        mut self,
        store: Arc<dyn PersistenceStore>,
        owner: impl Into<String>,
    ) -> Self {
        self.persistence = Some(Attached {
            store,
            owner: owner.into(),
        });
        self
    }

    pub fn with_analysis_service(mut self, service: Arc<dyn AnalysisService>) -> Self {
        self.analysis_service = Some(service);
        self
    }

    pub fn with_quiz_service(mut self, service: Arc<dyn QuizService>) -> Self {
        self.quiz_service = Some(service);
        self
    }

    pub fn with_assessment_service(mut self, service: Arc<dyn AssessmentService>) -> Self {
        self.assessment_service = Some(service);
        self
    }

    /// Use one implementation for all three services
    pub fn with_tutor<T>(self, tutor: Arc<T>) -> Self
    where
        T: AnalysisService + QuizService + AssessmentService + 'static,
    {
        self.with_analysis_service(tutor.clone())
            .with_quiz_service(tutor.clone())
            .with_assessment_service(tutor)
    }

    // ========== Accessors ==========

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn hidden_categories(&self) -> &HiddenCategories {
        &self.hidden
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.selected.as_deref().and_then(|id| self.store.node(id))
    }

    pub fn pending_analysis(&self) -> Option<&AnalysisResult> {
        self.pending.as_ref()
    }

    pub fn current_quiz(&self) -> Option<&QuizContent> {
        self.quiz.as_ref()
    }

    pub fn last_assessment(&self) -> Option<&AssessmentOutcome> {
        self.last_assessment.as_ref()
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    pub fn owner(&self) -> Option<&str> {
        self.persistence.as_ref().map(|p| p.owner.as_str())
    }

    // ========== Navigation ==========

    /// Select a node; switching nodes supersedes its quiz and assessment requests
    pub fn select_node(&mut self, node_id: &str) -> Result<()> {
        if !self.store.contains(node_id) {
            return Err(Error::NodeNotFound(node_id.to_string()));
        }
        if self.selected.as_deref() != Some(node_id) {
            self.tracker.supersede(RequestSlot::Quiz);
            self.tracker.supersede(RequestSlot::Assessment);
            self.quiz = None;
            self.last_assessment = None;
            self.selected = Some(node_id.to_string());
            debug!(node_id = %node_id, "Node selected");
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selected.take().is_some() {
            self.tracker.supersede(RequestSlot::Quiz);
            self.tracker.supersede(RequestSlot::Assessment);
            self.quiz = None;
            self.last_assessment = None;
        }
    }

    pub fn toggle_folder(&mut self, folder_id: &str) -> Result<()> {
        self.hierarchy = TreeMutator::toggle_folder(&self.hierarchy, folder_id)?;
        Ok(())
    }

    pub fn rename_folder(&mut self, folder_id: &str, name: &str) -> Result<()> {
        self.hierarchy = TreeMutator::rename_folder(&self.hierarchy, folder_id, name)?;
        Ok(())
    }

    /// Returns whether the category is now hidden
    pub fn toggle_category_visibility(&mut self, category: &str) -> bool {
        self.hidden.toggle(category)
    }

    pub fn is_category_hidden(&self, category: &str) -> bool {
        self.hidden.contains(category)
    }

    // ========== Graph changes ==========

    /// Merge candidates under `category`
    ///
    /// With persistence attached the batch is validated, written, and only
    /// then committed in memory.
    pub async fn merge(
        &mut self,
        candidates: &[CandidateConcept],
        category: &str,
    ) -> Result<MergeReport> {
        let plan = self.merger.plan(&self.store, candidates, category)?;
        if let Err(e) = self.store.check_append(&plan.nodes, &plan.links) {
            warn!(category = %plan.category, error = %e, "Merge rejected");
            return Err(e);
        }

        if let Some(attached) = &self.persistence
            && !plan.is_empty()
        {
            attached
                .store
                .append_graph(&attached.owner, &plan.nodes, &plan.links)
                .await?;
        }

        let report = ConceptMerger::commit(&mut self.store, plan)?;
        self.reproject();
        Ok(report)
    }

    /// Merge the pending analysis, then clear it so it cannot be saved twice
    pub async fn merge_pending(&mut self, category: &str) -> Result<MergeReport> {
        let concepts = self
            .pending
            .as_ref()
            .map(|p| p.concepts.clone())
            .ok_or_else(|| Error::ValidationFailed("No analysis to save".to_string()))?;
        let report = self.merge(&concepts, category).await?;
        self.pending = None;
        Ok(report)
    }

    /// Replace one pending candidate
    pub fn edit_pending(&mut self, index: usize, candidate: CandidateConcept) -> Result<()> {
        if candidate.label.trim().is_empty() {
            return Err(Error::ValidationFailed(
                "Concept label cannot be empty".to_string(),
            ));
        }
        let slot = self.pending_slot(index)?;
        *slot = candidate;
        Ok(())
    }

    /// Drop one pending candidate
    pub fn remove_pending(&mut self, index: usize) -> Result<CandidateConcept> {
        self.pending_slot(index)?;
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| Error::ValidationFailed("No analysis to edit".to_string()))?;
        Ok(pending.concepts.remove(index))
    }

    fn pending_slot(&mut self, index: usize) -> Result<&mut CandidateConcept> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| Error::ValidationFailed("No analysis to edit".to_string()))?;
        let len = pending.concepts.len();
        pending.concepts.get_mut(index).ok_or_else(|| {
            Error::ValidationFailed(format!("Concept #{} out of range (have {})", index + 1, len))
        })
    }

    /// Apply an assessment outcome to one node, returning its previous status
    pub async fn apply_status(
        &mut self,
        node_id: &str,
        outcome: &AssessmentOutcome,
    ) -> Result<MasteryStatus> {
        outcome.validate()?;
        if !self.store.contains(node_id) {
            return Err(Error::NodeNotFound(node_id.to_string()));
        }

        if let Some(attached) = &self.persistence {
            let record = AssessmentRecord::from_outcome(&attached.owner, node_id, outcome);
            attached.store.record_assessment(&record).await?;
        }

        let previous = StatusUpdater::apply(&mut self.store, node_id, outcome)?;
        self.reproject();
        Ok(previous)
    }

    /// Set a node's status directly, without an assessment record
    pub async fn set_status(&mut self, node_id: &str, status: MasteryStatus) -> Result<MasteryStatus> {
        if !self.store.contains(node_id) {
            return Err(Error::NodeNotFound(node_id.to_string()));
        }
        if let Some(attached) = &self.persistence
            && !attached
                .store
                .update_node_status(&attached.owner, node_id, status)
                .await?
        {
            return Err(Error::NodeNotFound(node_id.to_string()));
        }

        let previous = self.store.update_status(node_id, status)?;
        info!(node_id = %node_id, from = %previous, to = %status, "Mastery status set");
        self.reproject();
        Ok(previous)
    }

    fn reproject(&mut self) {
        self.hierarchy = self.projector.reproject(&self.store, &self.hierarchy);
    }

    // ========== Analysis ==========

    pub fn begin_analysis(&mut self, text: &str) -> Result<AnalysisRequest> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::ValidationFailed("Nothing to analyze".to_string()));
        }
        Ok(AnalysisRequest {
            token: self.tracker.issue(RequestSlot::Analysis),
            text: text.to_string(),
        })
    }

    /// Store the analysis as pending if the request is still current
    pub fn resolve_analysis(
        &mut self,
        request: &AnalysisRequest,
        result: Result<AnalysisResult>,
    ) -> Result<Resolution> {
        if !self.accept(&request.token) {
            return Ok(Resolution::Discarded);
        }
        let analysis = surface(RequestSlot::Analysis, result)?;
        debug!(concepts = analysis.concepts.len(), "Analysis applied");
        self.pending = Some(analysis);
        Ok(Resolution::Applied)
    }

    /// Analyze `text` with the configured service and keep the result pending
    pub async fn analyze(&mut self, text: &str) -> Result<AnalysisResult> {
        let service = self
            .analysis_service
            .clone()
            .ok_or(Error::ServiceUnavailable("analysis"))?;
        let request = self.begin_analysis(text)?;
        let result = service.analyze(&request.text).await;

        // the transcript is written before the analysis becomes pending
        if let (Ok(analysis), Some(attached)) = (&result, &self.persistence) {
            let question = ChatMessage::user(&attached.owner, &request.text);
            let answer = ChatMessage::bot(&attached.owner, &analysis.explanation)
                .with_subconcepts(analysis.concepts.clone());
            attached.store.save_message(&question).await?;
            attached.store.save_message(&answer).await?;
        }
        self.resolve_analysis(&request, result)?;
        Ok(self.pending.clone().unwrap_or_default())
    }

    // ========== Quiz ==========

    pub fn begin_quiz(&mut self) -> Result<QuizRequest> {
        let node = self.require_selected()?;
        let (node_id, concept_label) = (node.id.clone(), node.label.clone());
        Ok(QuizRequest {
            token: self.tracker.issue(RequestSlot::Quiz),
            node_id,
            concept_label,
        })
    }

    pub fn resolve_quiz(
        &mut self,
        request: &QuizRequest,
        result: Result<QuizContent>,
    ) -> Result<Resolution> {
        if !self.accept(&request.token) {
            return Ok(Resolution::Discarded);
        }
        let quiz = surface(RequestSlot::Quiz, result)?;
        debug!(node_id = %request.node_id, questions = quiz.len(), "Quiz applied");
        self.quiz = Some(quiz);
        Ok(Resolution::Applied)
    }

    /// Generate a quiz for the selected node
    pub async fn generate_quiz(&mut self) -> Result<QuizContent> {
        let service = self
            .quiz_service
            .clone()
            .ok_or(Error::ServiceUnavailable("quiz"))?;
        let request = self.begin_quiz()?;
        let result = service.generate(&request.concept_label).await;
        self.resolve_quiz(&request, result)?;
        Ok(self.quiz.clone().unwrap_or_default())
    }

    // ========== Assessment ==========

    pub fn begin_assessment(&mut self, explanation: &str) -> Result<AssessmentRequest> {
        let explanation = explanation.trim();
        if explanation.is_empty() {
            return Err(Error::ValidationFailed(
                "Explanation cannot be empty".to_string(),
            ));
        }
        let node = self.require_selected()?;
        let (node_id, concept_label) = (node.id.clone(), node.label.clone());
        Ok(AssessmentRequest {
            token: self.tracker.issue(RequestSlot::Assessment),
            node_id,
            concept_label,
            explanation: explanation.to_string(),
        })
    }

    /// Apply the outcome to the node if the request is still current
    ///
    /// Awaits the persistence write when one is attached.
    pub async fn resolve_assessment(
        &mut self,
        request: &AssessmentRequest,
        result: Result<AssessmentOutcome>,
    ) -> Result<Resolution> {
        if !self.accept(&request.token) {
            return Ok(Resolution::Discarded);
        }
        let outcome = surface(RequestSlot::Assessment, result)?;
        self.apply_status(&request.node_id, &outcome).await?;
        self.last_assessment = Some(outcome);
        Ok(Resolution::Applied)
    }

    /// Assess an explanation of the selected node and apply the outcome
    pub async fn assess(&mut self, explanation: &str) -> Result<AssessmentOutcome> {
        let service = self
            .assessment_service
            .clone()
            .ok_or(Error::ServiceUnavailable("assessment"))?;
        let request = self.begin_assessment(explanation)?;
        let result = service
            .evaluate(&request.concept_label, &request.explanation)
            .await;
        self.resolve_assessment(&request, result).await?;
        self.last_assessment
            .clone()
            .ok_or_else(|| Error::Other("Assessment was not applied".to_string()))
    }

    fn require_selected(&self) -> Result<&Node> {
        let id = self
            .selected
            .as_deref()
            .ok_or_else(|| Error::ValidationFailed("No concept selected".to_string()))?;
        self.store
            .node(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    fn accept(&self, token: &RequestToken) -> bool {
        match self.tracker.check(token) {
            Ok(()) => true,
            Err(stale) => {
                info!(slot = %token.slot, error = %stale, "Stale response discarded");
                false
            }
        }
    }

    // ========== Persisted side records ==========

    fn attached(&self) -> Result<&Attached> {
        self.persistence
            .as_ref()
            .ok_or(Error::ServiceUnavailable("persistence"))
    }

    pub async fn node_notes(&self, node_id: &str) -> Result<Option<NodeContent>> {
        let attached = self.attached()?;
        self.ensure_node(node_id)?;
        attached.store.get_content(&attached.owner, node_id).await
    }

    pub async fn save_node_notes(&self, node_id: &str, content: &str) -> Result<()> {
        let attached = self.attached()?;
        self.ensure_node(node_id)?;
        attached
            .store
            .save_content(&NodeContent::new(&attached.owner, node_id, content))
            .await
    }

    pub async fn delete_node_notes(&self, node_id: &str) -> Result<bool> {
        let attached = self.attached()?;
        self.ensure_node(node_id)?;
        attached.store.delete_content(&attached.owner, node_id).await
    }

    pub async fn chat_history(&self, limit: Option<i64>) -> Result<Vec<ChatMessage>> {
        let attached = self.attached()?;
        attached.store.list_messages(&attached.owner, limit).await
    }

    pub async fn assessment_history(&self, node_id: Option<&str>) -> Result<Vec<AssessmentRecord>> {
        let attached = self.attached()?;
        attached
            .store
            .list_assessments(&attached.owner, node_id)
            .await
    }

    fn ensure_node(&self, node_id: &str) -> Result<()> {
        if self.store.contains(node_id) {
            Ok(())
        } else {
            Err(Error::NodeNotFound(node_id.to_string()))
        }
    }
}

/// Pass a current response through, logging failures
fn surface<T>(slot: RequestSlot, result: Result<T>) -> Result<T> {
    result.inspect_err(|e| warn!(slot = %slot, error = %e, "Service call failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn seeded() -> Controller {
        Controller::with_seed(Config::default()).unwrap()
    }

    #[test]
    fn test_seeded_controller_projects_all_nodes() {
        let controller = seeded();
        assert_eq!(controller.hierarchy().leaf_count(), 8);
        assert!(controller.selected_node().is_none());
    }

    #[test]
    fn test_select_unknown_node() {
        let mut controller = seeded();
        let err = controller.select_node("ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_selecting_another_node_supersedes_requests() {
        let mut controller = seeded();
        controller.select_node("c1").unwrap();
        let quiz = controller.begin_quiz().unwrap();
        let assessment = controller.begin_assessment("It uses attention").unwrap();

        // reselecting the same node keeps requests alive
        controller.select_node("c1").unwrap();
        assert!(controller.tracker().is_current(&quiz.token));

        controller.select_node("c2").unwrap();
        assert!(!controller.tracker().is_current(&quiz.token));
        assert!(!controller.tracker().is_current(&assessment.token));
    }

    #[test]
    fn test_requests_need_selection() {
        let mut controller = seeded();
        assert_eq!(
            controller.begin_quiz().unwrap_err().kind(),
            ErrorKind::Validation
        );
        controller.select_node("c1").unwrap();
        assert_eq!(
            controller.begin_assessment("  ").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_pending_edits() {
        let mut controller = seeded();
        assert!(controller.remove_pending(0).is_err());

        let request = controller.begin_analysis("What is RAG?").unwrap();
        let result = AnalysisResult {
            explanation: "Retrieval then generation".into(),
            concepts: vec![CandidateConcept::new("Retriever"), CandidateConcept::new("Reranker")],
        };
        controller.resolve_analysis(&request, Ok(result)).unwrap();

        controller
            .edit_pending(1, CandidateConcept::new("Cross-encoder"))
            .unwrap();
        assert!(controller.edit_pending(5, CandidateConcept::new("x")).is_err());
        assert!(controller.edit_pending(0, CandidateConcept::new(" ")).is_err());

        let removed = controller.remove_pending(0).unwrap();
        assert_eq!(removed.label, "Retriever");
        let pending = controller.pending_analysis().unwrap();
        assert_eq!(pending.concepts.len(), 1);
        assert_eq!(pending.concepts[0].label, "Cross-encoder");
    }

    #[test]
    fn test_folder_edits_and_visibility() {
        let mut controller = seeded();
        controller.toggle_folder("bucket:mathematics").unwrap();
        assert!(controller.hierarchy().folder("bucket:mathematics").unwrap().is_open);
        controller
            .rename_folder("category-folder:Skill", "Skills")
            .unwrap();
        assert!(controller.toggle_folder("nope").is_err());

        assert!(controller.toggle_category_visibility("Math"));
        assert!(controller.is_category_hidden("Math"));
        assert!(!controller.toggle_category_visibility("Math"));
    }

    #[tokio::test]
    async fn test_services_missing() {
        let mut controller = seeded();
        let err = controller.analyze("hello").await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable("analysis")));
        assert!(controller.node_notes("c1").await.is_err());
    }
}
