//! Client side of the lost-and-found reporting service: the backend HTTP
//! facade, the photo submission workflow, and local listing filters.

use shared::{domain::LostItemId, protocol::AnalysisResult};

pub mod api;
pub mod config;
pub mod error;
pub mod listing;
pub mod workflow;

pub use api::{HttpLostFoundClient, LostFoundApi, UploadedFile};
pub use config::{load_settings, ClientSettings};
pub use error::{ApiOperation, ClientError};
pub use workflow::{
    DraftField, LostItemDraft, SubmissionWorkflow, WorkflowPhase, WorkflowSnapshot,
};

/// Status updates for whatever is presenting the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    PhaseChanged(WorkflowPhase),
    AnalysisApplied(AnalysisResult),
    ItemCreated { id: LostItemId },
    Info(String),
    Error(String),
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
