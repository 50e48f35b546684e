//! The hub-and-spoke execution graph.
//!
//! The topology is fixed: the Manager is the hub, each worker is a spoke
//! that always hands control back, and FINISH is the only exit. The
//! executor loop reads `state.next_actor` once per step, dispatches the
//! node, and applies the returned update. Routing to a node that is not
//! wired is a topology error, surfaced at build time for the static shape
//! and at run time if dispatch ever misses.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use codecrew_core::error::{CrewError, Result};
use codecrew_core::event::WorkflowEvent;
use codecrew_core::state::TeamState;
use codecrew_core::types::NextActor;

use crate::supervisor::Supervisor;
use crate::workers::WorkerNode;

/// Static description of the graph shape: which nodes exist and which
/// directed edges the executor may follow.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    pub entry: NextActor,
    pub workers: Vec<NextActor>,
    pub edges: Vec<(NextActor, NextActor)>,
}

impl GraphTopology {
    fn hub_and_spoke() -> Self {
        let workers = vec![NextActor::Ba, NextActor::Dev, NextActor::Tester];
        let mut edges = Vec::new();
        for worker in &workers {
            edges.push((NextActor::Manager, *worker));
            edges.push((*worker, NextActor::Manager));
        }
        edges.push((NextActor::Manager, NextActor::Finish));
        Self {
            entry: NextActor::Manager,
            workers,
            edges,
        }
    }
}

/// The process-wide graph shape. Identical for every run.
pub fn topology() -> &'static GraphTopology {
    static TOPOLOGY: OnceLock<GraphTopology> = OnceLock::new();
    TOPOLOGY.get_or_init(GraphTopology::hub_and_spoke)
}

/// Builder that wires the supervisor and worker nodes into a runnable graph.
///
/// Validation happens in [`TeamGraphBuilder::build`]: every worker spoke in
/// the topology must have exactly one node wired under its dispatch key.
pub struct TeamGraphBuilder {
    supervisor: Supervisor,
    workers: Vec<Arc<dyn WorkerNode>>,
}

impl TeamGraphBuilder {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            supervisor,
            workers: Vec::new(),
        }
    }

    pub fn with_worker(mut self, worker: Arc<dyn WorkerNode>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn build(self) -> Result<TeamGraph> {
        let mut wired: HashMap<NextActor, Arc<dyn WorkerNode>> = HashMap::new();
        for worker in self.workers {
            let actor = worker.actor();
            if !topology().workers.contains(&actor) {
                return Err(CrewError::Topology(format!(
                    "'{}' is not a worker spoke in the graph",
                    actor
                )));
            }
            if wired.insert(actor, worker).is_some() {
                return Err(CrewError::Topology(format!(
                    "duplicate node wired for '{}'",
                    actor
                )));
            }
        }
        for actor in &topology().workers {
            if !wired.contains_key(actor) {
                return Err(CrewError::Topology(format!(
                    "no node wired for '{}'",
                    actor
                )));
            }
        }
        Ok(TeamGraph {
            supervisor: self.supervisor,
            workers: wired,
        })
    }
}

/// The runnable graph: supervisor plus one node per worker spoke.
pub struct TeamGraph {
    supervisor: Supervisor,
    workers: HashMap<NextActor, Arc<dyn WorkerNode>>,
}

impl TeamGraph {
    pub fn builder(supervisor: Supervisor) -> TeamGraphBuilder {
        TeamGraphBuilder::new(supervisor)
    }

    /// Run the graph to completion and return the final state.
    pub async fn run(&self, state: TeamState) -> Result<TeamState> {
        self.drive(state, None).await
    }

    /// Run the graph, emitting one [`WorkflowEvent`] per observable step.
    ///
    /// The stream is finite and ends with exactly one `done` (run reached
    /// FINISH) or `error` (run abandoned by an executor error).
    pub fn run_streaming(self: Arc<Self>, state: TeamState) -> ReceiverStream<WorkflowEvent> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            match self.drive(state, Some(&tx)).await {
                Ok(final_state) => {
                    let event = WorkflowEvent::Done {
                        status: final_state.status,
                        iteration: final_state.iteration_count,
                        artifacts: final_state.artifacts.iter().cloned().collect(),
                        final_response: final_state.final_response,
                    };
                    let _ = tx.send(event).await;
                }
                Err(e) => {
                    let _ = tx
                        .send(WorkflowEvent::Error {
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        });
        ReceiverStream::new(rx)
    }

    async fn drive(
        &self,
        mut state: TeamState,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<TeamState> {
        // Each routing decision consumes one iteration, so a correct
        // supervisor bounds the loop. The step guard only fires if a node
        // misbehaves and stops advancing the counter.
        let max_steps = state.max_iterations as usize * 2 + 8;

        for _ in 0..max_steps {
            let actor = state.next_actor;
            if actor == NextActor::Finish {
                info!(
                    status = %state.status,
                    iterations = state.iteration_count,
                    artifacts = state.artifacts.len(),
                    "Workflow reached FINISH"
                );
                return Ok(state);
            }

            let node_name = actor.to_string();
            if let Some(tx) = events {
                let _ = tx
                    .send(WorkflowEvent::NodeStart {
                        node: node_name.clone(),
                        iteration: state.iteration_count,
                    })
                    .await;
            }

            let messages_before = state.messages.len();
            let results_before = (
                state.ba_result.is_some(),
                state.dev_result.is_some(),
                state.tester_result.is_some(),
            );

            let update = if actor == NextActor::Manager {
                self.supervisor.turn(&state).await
            } else {
                let worker = self.workers.get(&actor).ok_or_else(|| {
                    CrewError::Topology(format!("no node wired for '{}'", actor))
                })?;
                debug!(node = worker.name(), "Dispatching worker turn");
                worker.run(&state).await
            };
            state.apply(update);

            if let Some(tx) = events {
                for message in &state.messages[messages_before..] {
                    let _ = tx
                        .send(WorkflowEvent::Token {
                            agent: message.agent.clone(),
                            content: message.content.clone(),
                            node: Some(node_name.clone()),
                        })
                        .await;
                }
                for (agent, before, now) in [
                    ("ba", results_before.0, state.ba_result.is_some()),
                    ("dev", results_before.1, state.dev_result.is_some()),
                    ("tester", results_before.2, state.tester_result.is_some()),
                ] {
                    if now && !before {
                        let result = match agent {
                            "ba" => serde_json::to_value(&state.ba_result)?,
                            "dev" => serde_json::to_value(&state.dev_result)?,
                            _ => serde_json::to_value(&state.tester_result)?,
                        };
                        let _ = tx
                            .send(WorkflowEvent::AgentResult {
                                agent: agent.to_string(),
                                status: state.status.to_string(),
                                result,
                            })
                            .await;
                    }
                }
                let _ = tx
                    .send(WorkflowEvent::NodeEnd {
                        node: node_name,
                        status: state.status,
                    })
                    .await;
            }
        }

        Err(CrewError::Topology(format!(
            "graph did not reach FINISH within {} steps",
            max_steps
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        sample_analysis, sample_implementation, sample_test_plan, DownOracle, FailingDev,
        ScriptedBa, ScriptedDev, ScriptedTester,
    };
    use crate::workers::{BaWorker, DevWorker, TesterWorker};
    use codecrew_core::types::{BaOutcome, WorkflowStatus};
    use tokio_stream::StreamExt;

    fn scripted_graph(oracle: Option<Arc<dyn codecrew_core::traits::DecisionOracle>>) -> TeamGraph {
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
            .unwrap()
    }

    fn state() -> TeamState {
        TeamState::new("build a login system", None, 10)
    }

    #[test]
    fn test_topology_is_hub_and_spoke() {
        let t = topology();
        assert_eq!(t.entry, NextActor::Manager);
        assert_eq!(t.workers.len(), 3);
        for worker in &t.workers {
            assert!(t.edges.contains(&(NextActor::Manager, *worker)));
            assert!(t.edges.contains(&(*worker, NextActor::Manager)));
        }
        assert!(t.edges.contains(&(NextActor::Manager, NextActor::Finish)));
    }

    #[test]
    fn test_build_rejects_missing_worker() {
        let result = TeamGraph::builder(Supervisor::new(None))
            .with_worker(Arc::new(BaWorker::new(Arc::new(ScriptedBa(
                BaOutcome::Complete(sample_analysis(0, &[])),
            )))))
            .build();
        match result {
            Err(CrewError::Topology(msg)) => assert!(msg.contains("no node wired")),
            other => panic!("expected topology error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_rejects_duplicate_worker() {
        let ba = || {
            Arc::new(BaWorker::new(Arc::new(ScriptedBa(BaOutcome::Complete(
                sample_analysis(0, &[]),
            )))))
        };
        let result = TeamGraph::builder(Supervisor::new(None))
            .with_worker(ba())
            .with_worker(ba())
            .build();
        assert!(matches!(result, Err(CrewError::Topology(_))));
    }

    #[tokio::test]
    async fn test_run_without_oracle_completes_canonical_flow() {
        let graph = scripted_graph(None);
        let final_state = graph.run(state()).await.unwrap();

        assert_eq!(final_state.status, WorkflowStatus::Completed);
        assert_eq!(final_state.next_actor, NextActor::Finish);
        // BA, Dev, Tester, then FINISH: four routing decisions.
        assert_eq!(final_state.iteration_count, 4);
        assert!(final_state.artifacts.contains("src/login.rs"));
        assert!(final_state.artifacts.contains("src/auth.rs"));
        assert!(final_state.artifacts.contains("tests/login_test.rs"));
        assert!(final_state.final_response.is_some());
    }

    #[tokio::test]
    async fn test_run_with_down_oracle_still_terminates() {
        let graph = scripted_graph(Some(Arc::new(DownOracle)));
        let final_state = graph.run(state()).await.unwrap();
        assert_eq!(final_state.status, WorkflowStatus::Completed);
        assert_eq!(final_state.iteration_count, 4);
    }

    #[tokio::test]
    async fn test_run_terminates_after_worker_failure() {
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
            .unwrap();

        let final_state = graph.run(state()).await.unwrap();
        assert_eq!(final_state.status, WorkflowStatus::Failed);
        let response = final_state.final_response.unwrap();
        assert!(response.starts_with("Something went wrong:"));
        assert!(response.contains("disk full"));
    }

    #[tokio::test]
    async fn test_streaming_events_are_ordered_and_end_in_done() {
        let graph = Arc::new(scripted_graph(None));
        let events: Vec<WorkflowEvent> = graph.run_streaming(state()).collect().await;

        assert!(matches!(events[0], WorkflowEvent::NodeStart { .. }));
        let last = events.last().unwrap();
        assert!(matches!(last, WorkflowEvent::Done { .. }));
        // Exactly one terminal event, at the end.
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1);

        if let WorkflowEvent::Done {
            status,
            iteration,
            artifacts,
            final_response,
        } = last
        {
            assert_eq!(*status, WorkflowStatus::Completed);
            assert_eq!(*iteration, 4);
            assert_eq!(artifacts.len(), 3);
            assert!(final_response.is_some());
        }

        // Every NodeStart is eventually matched by a NodeEnd for that node.
        let starts = events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::NodeStart { .. }))
            .count();
        let ends = events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::NodeEnd { .. }))
            .count();
        assert_eq!(starts, ends);
    }

    #[tokio::test]
    async fn test_streaming_emits_agent_results_once_each() {
        let graph = Arc::new(scripted_graph(None));
        let events: Vec<WorkflowEvent> = graph.run_streaming(state()).collect().await;

        let agents: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::AgentResult { agent, .. } => Some(agent.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(agents, vec!["ba", "dev", "tester"]);
    }
}
