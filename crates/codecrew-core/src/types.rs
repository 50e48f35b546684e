use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The node that holds control next. Written only by the node that currently
/// has control, read once by the executor to decide dispatch.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextActor {
    Ba,
    Dev,
    Tester,
    Manager,
    #[serde(rename = "FINISH")]
    Finish,
}

impl std::fmt::Display for NextActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextActor::Ba => write!(f, "ba"),
            NextActor::Dev => write!(f, "dev"),
            NextActor::Tester => write!(f, "tester"),
            NextActor::Manager => write!(f, "manager"),
            NextActor::Finish => write!(f, "FINISH"),
        }
    }
}

/// A routing choice the supervisor can make. A closed subset of [`NextActor`]:
/// the supervisor never routes to itself.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTarget {
    Ba,
    Dev,
    Tester,
    #[serde(rename = "FINISH")]
    Finish,
}

impl From<RouteTarget> for NextActor {
    fn from(target: RouteTarget) -> Self {
        match target {
            RouteTarget::Ba => NextActor::Ba,
            RouteTarget::Dev => NextActor::Dev,
            RouteTarget::Tester => NextActor::Tester,
            RouteTarget::Finish => NextActor::Finish,
        }
    }
}

impl std::fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        NextActor::from(*self).fmt(f)
    }
}

/// Structured output of the supervisor's routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Which node should act next, or FINISH.
    pub next_agent: RouteTarget,
    /// Why this node was chosen, given the current state.
    pub reasoning: String,
}

/// Coarse run status. `Completed`, `Failed` and `WaitingForClarification`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    WaitingForClarification,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed
                | WorkflowStatus::Failed
                | WorkflowStatus::WaitingForClarification
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::WaitingForClarification => "waiting_for_clarification",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One entry in the run's conversation log, attributed to the node that
/// produced it. Insertion order is the authoritative timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMessage {
    pub agent: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TeamMessage {
    pub fn new(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// A single user story with acceptance criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStory {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

/// Result of the Business Analyst's requirements analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaAnalysis {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub user_stories: Vec<UserStory>,
    /// Clarifying questions when the request is ambiguous.
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// BA outcome: either the requirements are clear, or clarification is needed.
/// Specialist-level failures are reported as errors, not as an outcome.
#[derive(Debug, Clone)]
pub enum BaOutcome {
    Complete(BaAnalysis),
    Clarify(BaAnalysis),
}

/// A planned file with a summary, produced before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePlan {
    pub path: String,
    pub summary: String,
}

/// A generated file with content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Result of the Developer's implementation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationResult {
    pub success: bool,
    #[serde(default)]
    pub plan: Vec<FilePlan>,
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    /// Per-file explanations (path -> explanation).
    #[serde(default)]
    pub explanations: HashMap<String, String>,
    /// Paths that were actually written to the workspace.
    #[serde(default)]
    pub created_files: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ImplementationResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            plan: vec![],
            files: vec![],
            explanations: HashMap::new(),
            created_files: vec![],
            error: Some(error.into()),
        }
    }
}

/// A generated test file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

/// A single test case inside a test file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Maps a user story to the test files covering it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestMatrixEntry {
    pub story_id: String,
    #[serde(default)]
    pub test_files: Vec<String>,
}

/// Risk assessment over the reviewed artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Overall risk level: "low", "medium" or "high".
    pub level: String,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// Outcome of validating the generated tests (if they were run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestValidationResult {
    pub passed: bool,
    #[serde(default)]
    pub output: String,
}

/// Result of the Tester's review pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlan {
    #[serde(default)]
    pub tests: Vec<TestFile>,
    #[serde(default)]
    pub matrix: Vec<TestMatrixEntry>,
    pub risk_assessment: RiskAssessment,
    #[serde(default)]
    pub validation: Option<TestValidationResult>,
}

/// The mutable working record threaded through a run. Owned by whichever
/// worker is currently active; execution is strictly sequential so there is
/// never a concurrent writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_stories: Vec<UserStory>,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Task {
    /// Create a fresh in-progress task for a user request.
    pub fn for_request(user_request: &str, project_id: Option<&str>) -> Self {
        let now = Utc::now();
        let mut title: String = user_request.chars().take(50).collect();
        if user_request.chars().count() > 50 {
            title.push_str("...");
        }
        Self {
            id: generate_task_id(),
            title: format!("Task for: {}", title),
            description: user_request.to_string(),
            status: "in_progress".to_string(),
            assigned_to: None,
            project_id: project_id.map(|p| p.to_string()),
            user_stories: vec![],
            context: vec![],
            artifacts: vec![],
            created_at: now,
            updated_at: now,
            error_message: None,
        }
    }
}

/// Generate a unique task id (`task-<12 hex chars>`).
pub fn generate_task_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("task-{}", &hex[..12])
}
