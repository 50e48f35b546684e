//! Streaming event wire shape: one JSON object per event, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::types::WorkflowStatus;

/// An event emitted by the streaming executor. The sequence per run is
/// finite and ordered; it ends with exactly one `done` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A node is about to run.
    NodeStart { node: String, iteration: u32 },
    /// A node finished its turn.
    NodeEnd {
        node: String,
        status: WorkflowStatus,
    },
    /// A content delta produced by a node (one per appended log entry).
    Token {
        agent: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        node: Option<String>,
    },
    /// A worker's result field newly became non-null.
    AgentResult {
        agent: String,
        status: String,
        result: serde_json::Value,
    },
    /// Terminal event for a run that reached FINISH.
    Done {
        status: WorkflowStatus,
        iteration: u32,
        artifacts: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        final_response: Option<String>,
    },
    /// Terminal event for a run abandoned by an internal error.
    Error { error: String },
}

impl WorkflowEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowEvent::Done { .. } | WorkflowEvent::Error { .. })
    }
}
