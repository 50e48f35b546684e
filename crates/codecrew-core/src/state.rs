//! Shared workflow state and its merge semantics.
//!
//! A run threads a single [`TeamState`] through every node. Nodes never
//! mutate the state directly; they return a [`StateUpdate`] and the executor
//! applies it with [`TeamState::apply`]. Each field has an explicit reducer:
//! the conversation log appends, artifacts union, and scalar fields
//! overwrite only when the update carries a value.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{
    BaAnalysis, ImplementationResult, NextActor, Task, TeamMessage, TestPlan, WorkflowStatus,
};

/// The single shared record for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamState {
    /// Immutable input, set once at run start.
    pub user_request: String,
    /// Immutable workspace scoping for workers.
    pub project_id: Option<String>,
    /// Append-only conversation log; insertion order is the timeline.
    pub messages: Vec<TeamMessage>,
    /// The supervisor's routing decision, read once per step by the executor.
    pub next_actor: NextActor,
    /// Mutable working record, owned by the currently active worker.
    pub task: Option<Task>,
    pub ba_result: Option<BaAnalysis>,
    pub dev_result: Option<ImplementationResult>,
    pub tester_result: Option<TestPlan>,
    /// File paths produced by workers. Grows monotonically.
    pub artifacts: BTreeSet<String>,
    pub status: WorkflowStatus,
    /// Populated only when the BA finds the request ambiguous.
    pub clarifying_questions: Vec<String>,
    /// Set exactly once, by the supervisor, on termination.
    pub final_response: Option<String>,
    /// Set on first unrecoverable failure.
    pub error_message: Option<String>,
    pub iteration_count: u32,
    pub max_iterations: u32,
}

impl TeamState {
    /// Fresh state for a new run: all optional fields empty, control at the
    /// manager, `status = pending`, counter at zero.
    pub fn new(user_request: impl Into<String>, project_id: Option<String>, max_iterations: u32) -> Self {
        let user_request = user_request.into();
        let messages = vec![TeamMessage::user(user_request.clone())];
        Self {
            user_request,
            project_id,
            messages,
            next_actor: NextActor::Manager,
            task: None,
            ba_result: None,
            dev_result: None,
            tester_result: None,
            artifacts: BTreeSet::new(),
            status: WorkflowStatus::Pending,
            clarifying_questions: vec![],
            final_response: None,
            error_message: None,
            iteration_count: 0,
            max_iterations,
        }
    }

    /// Apply a partial update. Reducers per field:
    /// `messages` append, `artifacts` union, everything else
    /// overwrite-if-present.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        self.artifacts.extend(update.artifacts);
        if let Some(next) = update.next_actor {
            self.next_actor = next;
        }
        if let Some(task) = update.task {
            self.task = Some(task);
        }
        if let Some(ba) = update.ba_result {
            self.ba_result = Some(ba);
        }
        if let Some(dev) = update.dev_result {
            self.dev_result = Some(dev);
        }
        if let Some(tester) = update.tester_result {
            self.tester_result = Some(tester);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(questions) = update.clarifying_questions {
            self.clarifying_questions = questions;
        }
        if let Some(response) = update.final_response {
            self.final_response = Some(response);
        }
        if let Some(error) = update.error_message {
            self.error_message = Some(error);
        }
        if let Some(count) = update.iteration_count {
            self.iteration_count = count;
        }
    }

    /// The condensed digest handed to the routing oracle.
    pub fn summary(&self) -> StateSummary {
        StateSummary {
            request_preview: self.user_request.chars().take(100).collect(),
            ba_complete: self.ba_result.is_some(),
            dev_complete: self
                .dev_result
                .as_ref()
                .is_some_and(|r| r.success),
            tester_complete: self.tester_result.is_some(),
            artifact_count: self.artifacts.len(),
            iteration_count: self.iteration_count,
            max_iterations: self.max_iterations,
        }
    }
}

/// Partial state update returned by a node turn. Fields left empty/`None`
/// leave the corresponding state field untouched.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<TeamMessage>,
    pub next_actor: Option<NextActor>,
    pub task: Option<Task>,
    pub ba_result: Option<BaAnalysis>,
    pub dev_result: Option<ImplementationResult>,
    pub tester_result: Option<TestPlan>,
    pub artifacts: BTreeSet<String>,
    pub status: Option<WorkflowStatus>,
    pub clarifying_questions: Option<Vec<String>>,
    pub final_response: Option<String>,
    pub error_message: Option<String>,
    pub iteration_count: Option<u32>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, agent: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(TeamMessage::new(agent, content));
        self
    }

    pub fn with_next_actor(mut self, next: NextActor) -> Self {
        self.next_actor = Some(next);
        self
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_artifacts<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Condensed state digest for routing decisions: request preview, per-agent
/// completion flags and the iteration counter. Contains no free-form
/// conversation content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSummary {
    pub request_preview: String,
    pub ba_complete: bool,
    pub dev_complete: bool,
    pub tester_complete: bool,
    pub artifact_count: usize,
    pub iteration_count: u32,
    pub max_iterations: u32,
}

impl std::fmt::Display for StateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "User Request: {}...", self.request_preview)?;
        writeln!(
            f,
            "BA Analysis: {}",
            if self.ba_complete { "Complete" } else { "Not started" }
        )?;
        writeln!(
            f,
            "Dev Implementation: {}",
            if self.dev_complete { "Complete" } else { "Not started" }
        )?;
        writeln!(
            f,
            "Tester Review: {}",
            if self.tester_complete { "Complete" } else { "Not started" }
        )?;
        writeln!(f, "Artifacts: {} files", self.artifact_count)?;
        write!(f, "Iteration: {}/{}", self.iteration_count, self.max_iterations)
    }
}
