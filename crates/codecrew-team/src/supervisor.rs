//! The Manager (supervisor) node.
//!
//! One supervisor turn evaluates, in strict priority order: the iteration
//! cap, an already-failed run, a run awaiting clarification, and only then
//! the normal routing decision. The normal path consults the oracle when
//! one is configured; any oracle error degrades to the deterministic
//! fallback rule (BA -> Dev -> Tester -> FINISH), which is total.
//!
//! Iteration rule: a turn increments `iteration_count` iff it reaches the
//! normal decision procedure — both worker routes and an oracle/fallback
//! FINISH count. The early-exit branches terminate without incrementing,
//! which keeps `iteration_count <= max_iterations` exact.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use codecrew_core::state::{StateUpdate, TeamState};
use codecrew_core::traits::DecisionOracle;
use codecrew_core::types::{NextActor, RouteDecision, RouteTarget, WorkflowStatus};

const MANAGER: &str = "Manager";

pub struct Supervisor {
    oracle: Option<Arc<dyn DecisionOracle>>,
}

impl Supervisor {
    pub fn new(oracle: Option<Arc<dyn DecisionOracle>>) -> Self {
        Self { oracle }
    }

    /// Take one supervisor turn over the current state.
    pub async fn turn(&self, state: &TeamState) -> StateUpdate {
        info!(
            iteration = state.iteration_count,
            max = state.max_iterations,
            status = %state.status,
            ba = state.ba_result.is_some(),
            dev = state.dev_result.is_some(),
            tester = state.tester_result.is_some(),
            "Manager turn"
        );

        // 1. Iteration cap. Overrides every other condition.
        if state.iteration_count >= state.max_iterations {
            warn!(max = state.max_iterations, "Iteration cap reached, forcing completion");
            let final_response = self.synthesize_final(state, WorkflowStatus::Completed).await;
            let mut update = StateUpdate::new()
                .with_message(MANAGER, final_response.clone())
                .with_status(WorkflowStatus::Completed)
                .with_next_actor(NextActor::Finish);
            update.final_response = Some(final_response);
            return update;
        }

        // 2. Already failed: narrate and terminate.
        if state.status == WorkflowStatus::Failed {
            error!("Workflow failed, routing to FINISH");
            let final_response = self.synthesize_final(state, WorkflowStatus::Failed).await;
            let mut update = StateUpdate::new()
                .with_message(MANAGER, final_response.clone())
                .with_status(WorkflowStatus::Failed)
                .with_next_actor(NextActor::Finish);
            update.final_response = Some(final_response);
            return update;
        }

        // 3. Awaiting clarification: pause the workflow.
        if state.status == WorkflowStatus::WaitingForClarification {
            info!("Waiting for user clarification, routing to FINISH");
            let final_response = self
                .synthesize_final(state, WorkflowStatus::WaitingForClarification)
                .await;
            let mut update = StateUpdate::new()
                .with_message(MANAGER, final_response.clone())
                .with_status(WorkflowStatus::WaitingForClarification)
                .with_next_actor(NextActor::Finish);
            update.final_response = Some(final_response);
            return update;
        }

        // 4. Normal decision: oracle first, deterministic fallback on any error.
        let (decision, via_oracle) = match &self.oracle {
            Some(oracle) => {
                match oracle
                    .decide(state.summary(), state.messages.clone())
                    .await
                {
                    Ok(decision) => {
                        info!(next = %decision.next_agent, reasoning = %decision.reasoning, "Oracle decision");
                        (decision, true)
                    }
                    Err(e) => {
                        warn!(error = %e, "Oracle failed, using fallback routing");
                        (fallback_routing(state, Some(e.to_string())), false)
                    }
                }
            }
            None => {
                debug!("No oracle configured, using fallback routing");
                (fallback_routing(state, None), false)
            }
        };

        let next_iteration = state.iteration_count + 1;

        if decision.next_agent == RouteTarget::Finish {
            let final_response = self.synthesize_final(state, WorkflowStatus::Completed).await;
            let mut update = StateUpdate::new()
                .with_message(MANAGER, final_response.clone())
                .with_status(WorkflowStatus::Completed)
                .with_next_actor(NextActor::Finish);
            update.final_response = Some(final_response);
            update.iteration_count = Some(next_iteration);
            return update;
        }

        let prefix = if via_oracle { "Manager" } else { "Manager (Fallback)" };
        let mut update = StateUpdate::new()
            .with_message(
                MANAGER,
                format!(
                    "{}: Routing to {}. Reasoning: {}",
                    prefix, decision.next_agent, decision.reasoning
                ),
            )
            .with_status(WorkflowStatus::InProgress)
            .with_next_actor(decision.next_agent.into());
        update.iteration_count = Some(next_iteration);
        update
    }

    /// Synthesize the terminal human-readable response.
    ///
    /// Always derivable purely from state. The completed path may ask the
    /// oracle to rephrase the fact sheet; clarification and failure use the
    /// deterministic template directly, and any elaboration error falls
    /// back to it as well.
    async fn synthesize_final(&self, state: &TeamState, terminal: WorkflowStatus) -> String {
        match terminal {
            WorkflowStatus::WaitingForClarification => clarification_response(state),
            WorkflowStatus::Failed => failure_response(state),
            _ => {
                if let Some(oracle) = &self.oracle {
                    match oracle.elaborate(fact_sheet(state)).await {
                        Ok(text) if !text.trim().is_empty() => return text,
                        Ok(_) => {}
                        Err(e) => debug!(error = %e, "Final response elaboration failed, using template"),
                    }
                }
                completed_response(state)
            }
        }
    }
}

/// Deterministic, total routing rule used when the oracle is unavailable
/// or unparseable: BA if no analysis yet, Dev if no successful
/// implementation, Tester if no review, otherwise FINISH.
pub fn fallback_routing(state: &TeamState, error: Option<String>) -> RouteDecision {
    let dev_success = state.dev_result.as_ref().is_some_and(|r| r.success);

    let (next_agent, reasoning) = if state.ba_result.is_none() {
        (
            RouteTarget::Ba,
            "No BA analysis yet. Starting with requirements analysis.",
        )
    } else if !dev_success {
        (RouteTarget::Dev, "BA complete. Proceeding to implementation.")
    } else if state.tester_result.is_none() {
        (RouteTarget::Tester, "Dev complete. Proceeding to testing.")
    } else {
        (RouteTarget::Finish, "All agents completed. Workflow finished.")
    };

    let mut reasoning = reasoning.to_string();
    if let Some(error) = error {
        reasoning.push_str(&format!(" (Note: LLM routing failed: {})", error));
    }

    RouteDecision {
        next_agent,
        reasoning,
    }
}

/// Fact sheet for oracle elaboration: everything it may restate.
fn fact_sheet(state: &TeamState) -> String {
    let mut parts = vec![format!("User Request: {}", state.user_request)];

    if let Some(ba) = &state.ba_result {
        parts.push(format!("Business Analysis: {}", ba.title));
        if !ba.user_stories.is_empty() {
            let stories = ba
                .user_stories
                .iter()
                .take(3)
                .map(|s| format!("- {}", s.title))
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(format!("User Stories:\n{}", stories));
        }
    }

    if let Some(dev) = &state.dev_result {
        if dev.success && !dev.created_files.is_empty() {
            let files = dev
                .created_files
                .iter()
                .take(5)
                .map(|f| format!("- {}", f))
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(format!("Files Created:\n{}", files));
            if dev.created_files.len() > 5 {
                parts.push(format!("  ... and {} more files", dev.created_files.len() - 5));
            }
        }
    }

    if state.tester_result.is_some() {
        parts.push("Testing: Test plan generated".to_string());
    }

    if !state.artifacts.is_empty() {
        parts.push(format!("Total artifacts: {}", state.artifacts.len()));
    }

    parts.join("\n")
}

fn clarification_response(state: &TeamState) -> String {
    if state.clarifying_questions.is_empty() {
        return "I need some clarification to proceed.".to_string();
    }
    let list = state
        .clarifying_questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n");
    format!("I need some clarification to proceed:\n\n{}", list)
}

fn failure_response(state: &TeamState) -> String {
    let error = state
        .error_message
        .as_deref()
        .unwrap_or("Unknown error");
    format!("Something went wrong: {}", error)
}

fn completed_response(state: &TeamState) -> String {
    let mut parts = Vec::new();

    if let Some(ba) = &state.ba_result {
        parts.push(format!("Business analysis complete: {}.", ba.title));
    }
    if let Some(dev) = &state.dev_result {
        if dev.success && !dev.created_files.is_empty() {
            parts.push(format!("Created {} file(s).", dev.created_files.len()));
        }
    }
    if state.tester_result.is_some() {
        parts.push("Testing complete.".to_string());
    }
    if !state.artifacts.is_empty() {
        parts.push(format!("Total: {} artifacts created.", state.artifacts.len()));
    }

    if parts.is_empty() {
        "Workflow completed.".to_string()
    } else {
        parts.join(" ")
    }
}
