//! Top-level entry points: wire a graph from config and run a request.

use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use codecrew_core::config::CrewConfig;
use codecrew_core::error::Result;
use codecrew_core::event::WorkflowEvent;
use codecrew_core::state::TeamState;
use codecrew_llm::oracle_for;

use crate::graph::TeamGraph;
use crate::specialists::{LlmBa, LlmDev, LlmTester};
use crate::supervisor::Supervisor;
use crate::workers::{BaWorker, DevWorker, TesterWorker};

/// One workflow invocation.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub user_request: String,
    /// Workspace scoping; `None` lands files under the `default` project.
    pub project_id: Option<String>,
    /// Per-run override of the configured supervisor-turn budget.
    pub max_iterations: Option<u32>,
}

impl WorkflowRequest {
    pub fn new(user_request: impl Into<String>) -> Self {
        Self {
            user_request: user_request.into(),
            project_id: None,
            max_iterations: None,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// Build the production graph: shared LLM oracle for routing, one LLM
/// persona per worker, files confined to the configured workspace root.
pub fn graph_from_config(config: &CrewConfig) -> Result<TeamGraph> {
    let oracle = oracle_for(&config.model);
    let workspace = config.workspace_dir();

    TeamGraph::builder(Supervisor::new(Some(oracle)))
        .with_worker(Arc::new(BaWorker::new(Arc::new(LlmBa::new(&config.model)))))
        .with_worker(Arc::new(DevWorker::new(Arc::new(LlmDev::new(
            &config.model,
            workspace.clone(),
        )))))
        .with_worker(Arc::new(TesterWorker::new(Arc::new(LlmTester::new(
            &config.model,
            workspace,
        )))))
        .build()
}

fn initial_state(config: &CrewConfig, request: &WorkflowRequest) -> TeamState {
    let max_iterations = request
        .max_iterations
        .unwrap_or(config.team.max_iterations);
    info!(
        request = %request.user_request.chars().take(80).collect::<String>(),
        project = request.project_id.as_deref().unwrap_or("default"),
        max_iterations,
        "Starting workflow"
    );
    TeamState::new(
        request.user_request.clone(),
        request.project_id.clone(),
        max_iterations,
    )
}

/// Run a request to completion and return the final state.
pub async fn run_workflow(config: &CrewConfig, request: WorkflowRequest) -> Result<TeamState> {
    let graph = graph_from_config(config)?;
    graph.run(initial_state(config, &request)).await
}

/// Run a request as an event stream. The stream ends with exactly one
/// `done` or `error` event.
pub fn run_workflow_stream(
    config: &CrewConfig,
    request: WorkflowRequest,
) -> Result<ReceiverStream<WorkflowEvent>> {
    let graph = Arc::new(graph_from_config(config)?);
    Ok(graph.run_streaming(initial_state(config, &request)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecrew_core::config::{ModelConfig, TeamConfig};

    fn config() -> CrewConfig {
        CrewConfig {
            team: TeamConfig {
                max_iterations: 5,
                workspace: "/tmp/codecrew-test-ws".into(),
            },
            model: ModelConfig {
                model_id: "gpt-4o-mini".into(),
                api_key: Some("k".into()),
                base_url: None,
                max_tokens: 1024,
                temperature: 0.2,
            },
        }
    }

    #[test]
    fn test_graph_from_config_wires_all_nodes() {
        assert!(graph_from_config(&config()).is_ok());
    }

    #[test]
    fn test_request_override_beats_config_budget() {
        let request = WorkflowRequest::new("build it").with_max_iterations(3);
        let state = initial_state(&config(), &request);
        assert_eq!(state.max_iterations, 3);

        let request = WorkflowRequest::new("build it").with_project("proj-9");
        let state = initial_state(&config(), &request);
        assert_eq!(state.max_iterations, 5);
        assert_eq!(state.project_id.as_deref(), Some("proj-9"));
    }
}
