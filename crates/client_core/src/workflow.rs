//! Report-a-found-item workflow: photo upload, server-side analysis,
//! user review, and item creation.
//!
//! The controller owns the single in-progress draft. Upload and analysis run
//! in a spawned task; picking another photo aborts that task and bumps the
//! workflow generation, and every resumption point re-checks the generation
//! so a result for a superseded photo never reaches the draft.

use std::{fmt, sync::Arc};

use shared::{
    category::{normalize_category, DEFAULT_CATEGORY},
    domain::{LostItemId, StoredFilename},
    protocol::{AnalysisResult, CreateLostItemRequest},
};
use tokio::{
    sync::{broadcast, watch, Mutex, MutexGuard},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    api::{LostFoundApi, UploadedFile},
    error::{ClientError, Result},
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    Uploading,
    Analyzing,
    ReadyToEdit,
    Submitting,
}

impl WorkflowPhase {
    fn photo_in_flight(self) -> bool {
        matches!(self, Self::Uploading | Self::Analyzing)
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Analyzing => "analyzing",
            Self::ReadyToEdit => "ready to edit",
            Self::Submitting => "submitting",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Description,
    Category,
    FoundLocation,
}

/// The record being composed by the reporting user.
#[derive(Debug, Clone, PartialEq)]
pub struct LostItemDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub found_location: String,
    filename: Option<StoredFilename>,
}

impl Default for LostItemDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            found_location: String::new(),
            filename: None,
        }
    }
}

impl LostItemDraft {
    /// Photo reference; only ever set from an acknowledged upload.
    pub fn filename(&self) -> Option<&StoredFilename> {
        self.filename.as_ref()
    }

    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ClientError::validation(format!(
                "Please provide a {}.",
                missing.join(" and ")
            )))
        }
    }

    pub fn to_request(&self) -> CreateLostItemRequest {
        CreateLostItemRequest {
            title: self.title.clone(),
            description: self.description.clone(),
            category: normalize_category(Some(&self.category)),
            found_location: self.found_location.clone(),
            filename: self.filename.clone(),
        }
    }

    fn set(&mut self, field: DraftField, value: String) {
        match field {
            DraftField::Title => self.title = value,
            DraftField::Description => self.description = value,
            DraftField::Category => self.category = value,
            DraftField::FoundLocation => self.found_location = value,
        }
    }

    fn apply_analysis(&mut self, analysis: &AnalysisResult) {
        self.title = analysis.title.clone();
        self.description = analysis.description.clone();
        self.category = normalize_category(analysis.category.as_deref());
        if let Some(renamed) = analysis
            .filename
            .as_ref()
            .filter(|name| !name.as_str().trim().is_empty())
        {
            self.filename = Some(renamed.clone());
        }
    }

    /// Clears fields still holding a proposal from `analysis`; user edits stay.
    fn discard_analysis(&mut self, analysis: &AnalysisResult) {
        if self.title == analysis.title {
            self.title.clear();
        }
        if self.description == analysis.description {
            self.description.clear();
        }
        if self.category == normalize_category(analysis.category.as_deref()) {
            self.category = DEFAULT_CATEGORY.to_string();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    pub generation: u64,
    pub draft: LostItemDraft,
    pub selected_file: Option<String>,
    pub analysis: Option<AnalysisResult>,
    pub last_error: Option<String>,
}

struct WorkflowState {
    phase: WorkflowPhase,
    generation: u64,
    draft: LostItemDraft,
    selected_file: Option<String>,
    analysis: Option<AnalysisResult>,
    last_error: Option<String>,
}

impl WorkflowState {
    fn forget_photo(&mut self) {
        if let Some(previous) = self.analysis.take() {
            self.draft.discard_analysis(&previous);
        }
        self.draft.filename = None;
        self.selected_file = None;
    }
}

pub struct SubmissionWorkflow {
    api: Arc<dyn LostFoundApi>,
    inner: Mutex<WorkflowState>,
    pipeline: Mutex<Option<JoinHandle<()>>>,
    phase_tx: watch::Sender<WorkflowPhase>,
    events: broadcast::Sender<ClientEvent>,
}

impl SubmissionWorkflow {
    pub fn new(api: Arc<dyn LostFoundApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let (phase_tx, _) = watch::channel(WorkflowPhase::Idle);
        Arc::new(Self {
            api,
            inner: Mutex::new(WorkflowState {
                phase: WorkflowPhase::Idle,
                generation: 0,
                draft: LostItemDraft::default(),
                selected_file: None,
                analysis: None,
                last_error: None,
            }),
            pipeline: Mutex::new(None),
            phase_tx,
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.inner.lock().await;
        WorkflowSnapshot {
            phase: state.phase,
            generation: state.generation,
            draft: state.draft.clone(),
            selected_file: state.selected_file.clone(),
            analysis: state.analysis.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Starts upload-then-analyze for `file`, superseding any photo still in
    /// flight.
    pub async fn select_file(self: &Arc<Self>, file: UploadedFile) -> Result<()> {
        let mut pipeline = self.pipeline.lock().await;

        let generation = {
            let mut state = self.inner.lock().await;
            if state.phase == WorkflowPhase::Submitting {
                return Err(self.reject(
                    &mut state,
                    "A report is being submitted; wait before choosing another photo.",
                ));
            }
            if state.phase.photo_in_flight() {
                info!(
                    superseded_generation = state.generation,
                    "workflow: new photo supersedes in-flight attempt"
                );
            }
            state.generation += 1;
            state.forget_photo();
            state.selected_file = Some(file.file_name.clone());
            state.last_error = None;
            self.set_phase(&mut state, WorkflowPhase::Uploading);
            state.generation
        };

        if let Some(previous) = pipeline.take() {
            previous.abort();
        }

        let workflow = Arc::clone(self);
        *pipeline = Some(tokio::spawn(async move {
            match workflow.run_pipeline(generation, file).await {
                Ok(()) => {}
                Err(err) if err.is_stale() => {
                    debug!(generation, "workflow: dropped stale photo result");
                }
                Err(err) => warn!(generation, %err, "workflow: photo pipeline ended with error"),
            }
        }));

        Ok(())
    }

    /// Resolves once no upload/analysis is in flight.
    pub async fn wait_for_analysis(&self) {
        let mut phase_rx = self.phase_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = phase_rx.wait_for(|phase| !phase.photo_in_flight()).await;
    }

    pub async fn remove_file(&self) -> Result<()> {
        let mut pipeline = self.pipeline.lock().await;
        let mut state = self.inner.lock().await;
        if matches!(
            state.phase,
            WorkflowPhase::Uploading | WorkflowPhase::Submitting
        ) {
            let message = format!("Cannot remove the photo while {}.", state.phase);
            return Err(self.reject(&mut state, message));
        }

        state.generation += 1;
        state.forget_photo();
        state.last_error = None;
        self.set_phase(&mut state, WorkflowPhase::Idle);
        if let Some(previous) = pipeline.take() {
            previous.abort();
        }
        Ok(())
    }

    pub async fn edit_field(&self, field: DraftField, value: impl Into<String>) -> Result<()> {
        let mut state = self.inner.lock().await;
        if state.phase != WorkflowPhase::ReadyToEdit {
            let message = format!("Details cannot be edited while {}.", state.phase);
            return Err(self.reject(&mut state, message));
        }
        state.draft.set(field, value.into());
        Ok(())
    }

    /// Sends the draft; on success the draft is reset and the new id returned.
    pub async fn submit(&self) -> Result<LostItemId> {
        let request = {
            let mut state = self.inner.lock().await;
            let phase = state.phase;
            match phase {
                WorkflowPhase::ReadyToEdit => {}
                WorkflowPhase::Submitting => {
                    return Err(self.reject(&mut state, "This report is already being submitted."))
                }
                _ => {
                    return Err(self.reject(
                        &mut state,
                        "Choose a photo and wait for it to upload before reporting.",
                    ))
                }
            }
            if let Err(err) = state.draft.validate() {
                return Err(self.surface(&mut state, err));
            }
            state.last_error = None;
            self.set_phase(&mut state, WorkflowPhase::Submitting);
            state.draft.to_request()
        };

        let outcome = self.api.create_item(&request).await;

        let mut state = self.inner.lock().await;
        match outcome {
            Ok(created) => {
                state.draft = LostItemDraft::default();
                state.analysis = None;
                state.selected_file = None;
                self.set_phase(&mut state, WorkflowPhase::Idle);
                info!(id = created.id.0, "workflow: item reported");
                let _ = self.events.send(ClientEvent::ItemCreated { id: created.id });
                let _ = self
                    .events
                    .send(ClientEvent::Info(format!("Item reported (id: {})", created.id)));
                Ok(created.id)
            }
            Err(err) => {
                self.set_phase(&mut state, WorkflowPhase::ReadyToEdit);
                Err(self.surface(&mut state, err))
            }
        }
    }

    async fn run_pipeline(&self, generation: u64, file: UploadedFile) -> Result<()> {
        let uploaded = self.api.upload(file).await;

        let filename = {
            let mut state = self.resume(generation).await?;
            match uploaded {
                Ok(filename) => {
                    state.draft.filename = Some(filename.clone());
                    self.set_phase(&mut state, WorkflowPhase::Analyzing);
                    let _ = self
                        .events
                        .send(ClientEvent::Info("Photo uploaded; analyzing…".to_string()));
                    filename
                }
                Err(err) => {
                    state.selected_file = None;
                    self.set_phase(&mut state, WorkflowPhase::Idle);
                    return Err(self.surface(&mut state, err));
                }
            }
        };

        let analyzed = self.api.analyze(&filename).await;

        let mut state = self.resume(generation).await?;
        let outcome = match analyzed {
            Ok(analysis) => {
                state.draft.apply_analysis(&analysis);
                state.analysis = Some(analysis.clone());
                let _ = self.events.send(ClientEvent::AnalysisApplied(analysis));
                Ok(())
            }
            // The upload stands; the user can still fill the form by hand.
            Err(err) => Err(self.surface(&mut state, err)),
        };
        self.set_phase(&mut state, WorkflowPhase::ReadyToEdit);
        outcome
    }

    /// Re-enters the state after a suspension point, unless superseded.
    async fn resume(&self, generation: u64) -> Result<MutexGuard<'_, WorkflowState>> {
        let state = self.inner.lock().await;
        if state.generation != generation {
            return Err(ClientError::Stale);
        }
        Ok(state)
    }

    fn set_phase(&self, state: &mut WorkflowState, phase: WorkflowPhase) {
        if state.phase == phase {
            return;
        }
        debug!(from = %state.phase, to = %phase, generation = state.generation, "workflow: phase change");
        state.phase = phase;
        self.phase_tx.send_replace(phase);
        let _ = self.events.send(ClientEvent::PhaseChanged(phase));
    }

    fn surface(&self, state: &mut WorkflowState, err: ClientError) -> ClientError {
        let message = err.user_message();
        warn!(phase = %state.phase, %err, "workflow: operation failed");
        state.last_error = Some(message.clone());
        let _ = self.events.send(ClientEvent::Error(message));
        err
    }

    fn reject(&self, state: &mut WorkflowState, message: impl Into<String>) -> ClientError {
        self.surface(state, ClientError::validation(message))
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
