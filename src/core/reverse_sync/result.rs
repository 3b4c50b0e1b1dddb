//! Outcome of one reverse sync attempt

use crate::domain::{OperationKind, TransformErrorCode};
use std::fmt;

/// Steps of the per-resource state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    Start,
    ConflictCheck,
    ConflictResolve,
    Skip,
    Transform,
    Store,
    ConsistencyCheck,
    Done,
    Failed,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Start => "START",
            FlowState::ConflictCheck => "CONFLICT_CHECK",
            FlowState::ConflictResolve => "CONFLICT_RESOLVE",
            FlowState::Skip => "SKIP",
            FlowState::Transform => "TRANSFORM",
            FlowState::Store => "STORE",
            FlowState::ConsistencyCheck => "CONSISTENCY_CHECK",
            FlowState::Done => "DONE",
            FlowState::Failed => "FAILED",
        }
    }

    /// True for `Done`, `Skip` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Done | FlowState::Skip | FlowState::Failed)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an incoming resource was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// The resource is not newer than the version already synced
    AlreadyProcessed,
    /// The resource is newer but was written by the forward pipeline
    CircularUpdate,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::AlreadyProcessed => "ALREADY_PROCESSED",
            ConflictKind::CircularUpdate => "CIRCULAR_UPDATE",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flow-level failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowErrorCode {
    MissingResourceId,
    UnsupportedResourceType,
    TransformationFailed,
    UcsStorageFailed,
    PoolRejected,
    TaskFailed,
}

impl FlowErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowErrorCode::MissingResourceId => "MISSING_RESOURCE_ID",
            FlowErrorCode::UnsupportedResourceType => "UNSUPPORTED_RESOURCE_TYPE",
            FlowErrorCode::TransformationFailed => "TRANSFORMATION_FAILED",
            FlowErrorCode::UcsStorageFailed => "UCS_STORAGE_FAILED",
            FlowErrorCode::PoolRejected => "POOL_REJECTED",
            FlowErrorCode::TaskFailed => "TASK_FAILED",
        }
    }
}

impl fmt::Display for FlowErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed reverse sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowError {
    pub code: FlowErrorCode,
    pub message: String,

    /// Code of the transformer failure behind `TRANSFORMATION_FAILED`
    pub transform_code: Option<TransformErrorCode>,
}

impl FlowError {
    pub fn new(code: FlowErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            transform_code: None,
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transform_code {
            Some(inner) => write!(f, "[{}/{}] {}", self.code, inner, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Skipped,
    Failed,
}

/// Result of syncing one FHIR resource into UCS
///
/// A skip is a successful no-op. `states` holds every step visited, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseSyncResult {
    pub resource_id: Option<String>,
    pub status: SyncStatus,
    pub skip_reason: Option<ConflictKind>,
    pub operation: Option<OperationKind>,
    pub opensrp_id: Option<String>,
    pub error: Option<FlowError>,
    pub inconsistencies: Vec<String>,
    pub states: Vec<FlowState>,
}

impl ReverseSyncResult {
    pub(crate) fn synced(
        resource_id: String,
        operation: OperationKind,
        opensrp_id: String,
        inconsistencies: Vec<String>,
        states: Vec<FlowState>,
    ) -> Self {
        Self {
            resource_id: Some(resource_id),
            status: SyncStatus::Synced,
            skip_reason: None,
            operation: Some(operation),
            opensrp_id: Some(opensrp_id),
            error: None,
            inconsistencies,
            states,
        }
    }

    pub(crate) fn skipped(resource_id: String, reason: ConflictKind, states: Vec<FlowState>) -> Self {
        Self {
            resource_id: Some(resource_id),
            status: SyncStatus::Skipped,
            skip_reason: Some(reason),
            operation: None,
            opensrp_id: None,
            error: None,
            inconsistencies: Vec::new(),
            states,
        }
    }

    pub(crate) fn failed(resource_id: Option<String>, error: FlowError, states: Vec<FlowState>) -> Self {
        Self {
            resource_id,
            status: SyncStatus::Failed,
            skip_reason: None,
            operation: None,
            opensrp_id: None,
            error: Some(error),
            inconsistencies: Vec::new(),
            states,
        }
    }

    /// Synced or intentionally skipped
    pub fn is_success(&self) -> bool {
        self.status != SyncStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == SyncStatus::Skipped
    }

    /// The last state visited
    pub fn final_state(&self) -> Option<FlowState> {
        self.states.last().copied()
    }
}
