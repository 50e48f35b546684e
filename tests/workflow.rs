//! End-to-end workflow runs over scripted specialists: no network, real
//! graph loop, real supervisor.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;

use codecrew_core::event::WorkflowEvent;
use codecrew_core::state::{StateUpdate, TeamState};
use codecrew_core::types::{BaOutcome, NextActor, RouteDecision, RouteTarget, WorkflowStatus};
use codecrew_team::testing::{
    sample_analysis, sample_implementation, sample_test_plan, DownOracle, FailingDev, ScriptedBa,
    ScriptedDev, ScriptedOracle, ScriptedTester,
};
use codecrew_team::{BaWorker, DevWorker, Supervisor, TeamGraph, TesterWorker, WorkerNode};

fn happy_graph(oracle: Option<Arc<dyn codecrew_core::traits::DecisionOracle>>) -> TeamGraph {
    TeamGraph::builder(Supervisor::new(oracle))
        .with_worker(Arc::new(BaWorker::new(Arc::new(ScriptedBa(
            BaOutcome::Complete(sample_analysis(2, &[])),
        )))))
        .with_worker(Arc::new(DevWorker::new(Arc::new(ScriptedDev(
            sample_implementation(&["src/login.rs", "src/auth.rs"]),
        )))))
        .with_worker(Arc::new(TesterWorker::new(Arc::new(ScriptedTester(
            sample_test_plan("low", &["tests/login_test.rs"]),
        )))))
        .build()
        .expect("graph wires")
}

#[tokio::test]
async fn test_canonical_run_visits_each_worker_once() {
    let graph = happy_graph(None);
    let final_state = graph
        .run(TeamState::new("build a login system", None, 10))
        .await
        .expect("run completes");

    assert_eq!(final_state.status, WorkflowStatus::Completed);
    assert_eq!(final_state.next_actor, NextActor::Finish);
    // Four routing decisions: BA, Dev, Tester, FINISH.
    assert_eq!(final_state.iteration_count, 4);

    let artifacts: Vec<&str> = final_state.artifacts.iter().map(|s| s.as_str()).collect();
    assert_eq!(
        artifacts,
        vec!["src/auth.rs", "src/login.rs", "tests/login_test.rs"]
    );

    // The log keeps the timeline: user first, workers in visit order.
    let agents: Vec<&str> = final_state
        .messages
        .iter()
        .map(|m| m.agent.as_str())
        .collect();
    assert_eq!(agents[0], "user");
    let worker_order: Vec<&str> = agents
        .iter()
        .copied()
        .filter(|a| matches!(*a, "BA" | "Dev" | "Tester"))
        .collect();
    assert_eq!(worker_order, vec!["BA", "Dev", "Tester"]);
}

#[tokio::test]
async fn test_terminates_for_any_budget_even_with_unreachable_oracle() {
    for max_iterations in [1, 2, 3, 5, 10] {
        let graph = happy_graph(Some(Arc::new(DownOracle)));
        let final_state = graph
            .run(TeamState::new("build a login system", None, max_iterations))
            .await
            .expect("run completes");

        assert!(final_state.status.is_terminal());
        assert_eq!(final_state.next_actor, NextActor::Finish);
        assert!(final_state.iteration_count <= max_iterations);
        assert!(final_state.final_response.is_some());
    }
}

#[tokio::test]
async fn test_iteration_cap_beats_an_oracle_that_never_finishes() {
    let decisions = (0..10)
        .map(|_| RouteDecision {
            next_agent: RouteTarget::Dev,
            reasoning: "keep iterating".into(),
        })
        .collect();
    let graph = happy_graph(Some(Arc::new(ScriptedOracle::with_decisions(decisions))));

    let final_state = graph
        .run(TeamState::new("build a login system", None, 3))
        .await
        .expect("run completes");

    assert_eq!(final_state.status, WorkflowStatus::Completed);
    assert_eq!(final_state.iteration_count, 3);
    assert!(final_state.final_response.is_some());
}

#[tokio::test]
async fn test_clarification_pauses_after_one_iteration() {
    let questions = ["Which identity provider?", "Is MFA required?"];
    let graph = TeamGraph::builder(Supervisor::new(None))
        .with_worker(Arc::new(BaWorker::new(Arc::new(ScriptedBa(
            BaOutcome::Clarify(sample_analysis(0, &questions)),
        )))))
        .with_worker(Arc::new(DevWorker::new(Arc::new(ScriptedDev(
            sample_implementation(&[]),
        )))))
        .with_worker(Arc::new(TesterWorker::new(Arc::new(ScriptedTester(
            sample_test_plan("low", &[]),
        )))))
        .build()
        .expect("graph wires");

    let final_state = graph
        .run(TeamState::new("do something", None, 10))
        .await
        .expect("run completes");

    assert_eq!(final_state.status, WorkflowStatus::WaitingForClarification);
    // Only the route to BA consumed an iteration; the pause did not.
    assert_eq!(final_state.iteration_count, 1);
    assert!(final_state.dev_result.is_none());
    assert!(final_state.tester_result.is_none());

    let response = final_state.final_response.expect("final response set");
    assert!(response.contains("1. Which identity provider?"));
    assert!(response.contains("2. Is MFA required?"));
}

#[tokio::test]
async fn test_worker_failure_is_narrated_not_propagated() {
    let graph = TeamGraph::builder(Supervisor::new(None))
        .with_worker(Arc::new(BaWorker::new(Arc::new(ScriptedBa(
            BaOutcome::Complete(sample_analysis(1, &[])),
        )))))
        .with_worker(Arc::new(DevWorker::new(Arc::new(FailingDev(
            "disk full".into(),
        )))))
        .with_worker(Arc::new(TesterWorker::new(Arc::new(ScriptedTester(
            sample_test_plan("low", &[]),
        )))))
        .build()
        .expect("graph wires");

    let final_state = graph
        .run(TeamState::new("build a login system", None, 10))
        .await
        .expect("run still completes normally");

    assert_eq!(final_state.status, WorkflowStatus::Failed);
    assert_eq!(final_state.next_actor, NextActor::Finish);

    let response = final_state.final_response.expect("final response set");
    assert!(response.starts_with("Something went wrong:"));
    assert!(response.contains("disk full"));

    // The tester never ran.
    assert!(final_state.tester_result.is_none());
}

#[tokio::test]
async fn test_stream_is_finite_ordered_and_ends_in_done() {
    let graph = Arc::new(happy_graph(None));
    let events: Vec<WorkflowEvent> = graph
        .run_streaming(TeamState::new("build a login system", None, 10))
        .collect()
        .await;

    assert!(events.len() > 2);
    let terminal_positions: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminal_positions, vec![events.len() - 1]);

    match events.last().expect("at least one event") {
        WorkflowEvent::Done {
            status,
            iteration,
            artifacts,
            final_response,
        } => {
            assert_eq!(*status, WorkflowStatus::Completed);
            assert_eq!(*iteration, 4);
            assert!(artifacts.contains(&"src/login.rs".to_string()));
            assert!(artifacts.contains(&"tests/login_test.rs".to_string()));
            assert!(final_response.is_some());
        }
        other => panic!("expected done, got {:?}", other),
    }

    // The first observable step is the manager's opening turn.
    match &events[0] {
        WorkflowEvent::NodeStart { node, iteration } => {
            assert_eq!(node, "manager");
            assert_eq!(*iteration, 0);
        }
        other => panic!("expected node_start, got {:?}", other),
    }
}

/// A dev node that keeps routing to itself instead of handing control back
/// to the manager, so the iteration counter never advances.
struct StuckDev;

impl WorkerNode for StuckDev {
    fn actor(&self) -> NextActor {
        NextActor::Dev
    }

    fn name(&self) -> &'static str {
        "Dev"
    }

    fn run<'a>(&'a self, _state: &'a TeamState) -> BoxFuture<'a, StateUpdate> {
        Box::pin(async {
            StateUpdate::new()
                .with_message("Dev", "still working")
                .with_next_actor(NextActor::Dev)
        })
    }
}

fn stuck_graph() -> TeamGraph {
    TeamGraph::builder(Supervisor::new(None))
        .with_worker(Arc::new(BaWorker::new(Arc::new(ScriptedBa(
            BaOutcome::Complete(sample_analysis(1, &[])),
        )))))
        .with_worker(Arc::new(StuckDev))
        .with_worker(Arc::new(TesterWorker::new(Arc::new(ScriptedTester(
            sample_test_plan("low", &[]),
        )))))
        .build()
        .expect("graph wires")
}

#[tokio::test]
async fn test_stream_ends_in_single_error_when_a_node_never_yields() {
    let graph = Arc::new(stuck_graph());
    let events: Vec<WorkflowEvent> = graph
        .run_streaming(TeamState::new("build a login system", None, 3))
        .collect()
        .await;

    let terminal_positions: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminal_positions, vec![events.len() - 1]);

    match events.last().expect("at least one event") {
        WorkflowEvent::Error { error } => assert!(error.contains("FINISH")),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_surfaces_executor_error_when_a_node_never_yields() {
    let graph = stuck_graph();
    let err = graph
        .run(TeamState::new("build a login system", None, 3))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("FINISH"));
}

#[tokio::test]
async fn test_stream_events_serialize_with_wire_tags() {
    let graph = Arc::new(happy_graph(None));
    let events: Vec<WorkflowEvent> = graph
        .run_streaming(TeamState::new("build a login system", None, 10))
        .collect()
        .await;

    let tags: Vec<String> = events
        .iter()
        .map(|e| {
            let value = serde_json::to_value(e).expect("serializes");
            value["type"].as_str().expect("tag present").to_string()
        })
        .collect();

    assert_eq!(tags[0], "node_start");
    assert_eq!(tags.last().map(String::as_str), Some("done"));
    assert!(tags.iter().any(|t| t == "token"));
    assert!(tags.iter().any(|t| t == "agent_result"));
    assert!(tags.iter().any(|t| t == "node_end"));
}
