//! Worker nodes: BA, Dev and Tester.
//!
//! Each node wraps one specialist capability. A worker turn reads the
//! fields it needs from the shared state, invokes its specialist, and
//! normalizes the outcome into a `StateUpdate`. Failures never escape a
//! worker: any specialist error becomes `status = failed` plus an
//! `error_message`, and control still returns to the Manager so the run
//! always terminates through a supervisor decision.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{error, info, warn};

use codecrew_core::state::{StateUpdate, TeamState};
use codecrew_core::traits::{BaSpecialist, DevSpecialist, TesterSpecialist};
use codecrew_core::types::{BaOutcome, NextActor, Task, WorkflowStatus};

/// A unit of graph execution that takes one turn over the shared state.
///
/// Worker turns are infallible by contract: specialist failures are folded
/// into the returned update, never propagated.
pub trait WorkerNode: Send + Sync + 'static {
    /// The dispatch key this node is wired under.
    fn actor(&self) -> NextActor;

    /// Display name used in log attribution.
    fn name(&self) -> &'static str;

    fn run<'a>(&'a self, state: &'a TeamState) -> BoxFuture<'a, StateUpdate>;
}

/// Convert a specialist failure into a terminal-bound state update.
fn failure_update(agent: &str, error: String) -> StateUpdate {
    StateUpdate::new()
        .with_message(agent, format!("{} failed: {}", agent, error))
        .with_status(WorkflowStatus::Failed)
        .with_error(error)
        .with_next_actor(NextActor::Manager)
}

/// Business Analyst node: request -> user stories or clarifying questions.
pub struct BaWorker {
    specialist: Arc<dyn BaSpecialist>,
}

impl BaWorker {
    pub fn new(specialist: Arc<dyn BaSpecialist>) -> Self {
        Self { specialist }
    }
}

impl WorkerNode for BaWorker {
    fn actor(&self) -> NextActor {
        NextActor::Ba
    }

    fn name(&self) -> &'static str {
        "BA"
    }

    fn run<'a>(&'a self, state: &'a TeamState) -> BoxFuture<'a, StateUpdate> {
        Box::pin(async move {
            info!(request = %state.user_request.chars().take(80).collect::<String>(), "BA node starting analysis");

            let outcome = self
                .specialist
                .analyze(state.user_request.clone(), state.project_id.clone())
                .await;

            match outcome {
                Ok(BaOutcome::Clarify(analysis)) => {
                    let questions = analysis.questions.clone();
                    info!(questions = questions.len(), "BA needs clarification");
                    let mut update = StateUpdate::new()
                        .with_message(
                            self.name(),
                            format!(
                                "BA needs clarification. Questions: {}",
                                questions.join(", ")
                            ),
                        )
                        .with_status(WorkflowStatus::WaitingForClarification)
                        .with_next_actor(NextActor::Manager);
                    update.ba_result = Some(analysis);
                    update.clarifying_questions = Some(questions);
                    update
                }
                Ok(BaOutcome::Complete(analysis)) => {
                    let story_count = analysis.user_stories.len();
                    info!(stories = story_count, title = %analysis.title, "BA analysis complete");

                    // Attach the stories to the task if one already exists.
                    let task = state.task.clone().map(|mut t| {
                        t.user_stories = analysis.user_stories.clone();
                        t.updated_at = chrono::Utc::now();
                        t
                    });

                    let mut update = StateUpdate::new()
                        .with_message(
                            self.name(),
                            format!(
                                "BA Analysis Complete. Generated {} user stories. Title: {}",
                                story_count, analysis.title
                            ),
                        )
                        .with_next_actor(NextActor::Manager);
                    update.ba_result = Some(analysis);
                    update.task = task;
                    update
                }
                Err(e) => {
                    error!(error = %e, "BA analysis failed");
                    failure_update(self.name(), format!("analysis failed: {}", e))
                }
            }
        })
    }
}

/// Developer node: requirements -> implementation files.
pub struct DevWorker {
    specialist: Arc<dyn DevSpecialist>,
}

impl DevWorker {
    pub fn new(specialist: Arc<dyn DevSpecialist>) -> Self {
        Self { specialist }
    }
}

impl WorkerNode for DevWorker {
    fn actor(&self) -> NextActor {
        NextActor::Dev
    }

    fn name(&self) -> &'static str {
        "Dev"
    }

    fn run<'a>(&'a self, state: &'a TeamState) -> BoxFuture<'a, StateUpdate> {
        Box::pin(async move {
            info!("Dev node starting implementation");

            // Get or create the working task.
            let mut task = state
                .task
                .clone()
                .unwrap_or_else(|| Task::for_request(&state.user_request, state.project_id.as_deref()));

            // Fold the BA analysis into the task when available.
            let mut context = Vec::new();
            if let Some(ba) = &state.ba_result {
                if !ba.user_stories.is_empty() {
                    task.user_stories = ba.user_stories.clone();
                }
                task.description = format!("{}\n\nBA Analysis: {}", task.description, ba.description);
                context.push(format!("Requirement title: {}", ba.title));
            }
            task.assigned_to = Some("dev".to_string());
            task.updated_at = chrono::Utc::now();

            match self.specialist.implement(task.clone(), context).await {
                Ok(result) if !result.success => {
                    let error = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "implementation failed".to_string());
                    error!(error = %error, "Dev implementation reported failure");
                    let mut update =
                        failure_update(self.name(), format!("implementation failed: {}", error));
                    update.dev_result = Some(result);
                    update
                }
                Ok(result) => {
                    // Write errors surface as "[ERROR] ..." entries; keep them
                    // out of the artifact set.
                    let valid_files: Vec<String> = result
                        .created_files
                        .iter()
                        .filter(|f| !f.starts_with("[ERROR]"))
                        .cloned()
                        .collect();

                    info!(files = valid_files.len(), "Dev implementation complete");
                    task.artifacts = valid_files.clone();

                    let preview = valid_files
                        .iter()
                        .take(3)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ");
                    let suffix = if valid_files.len() > 3 { "..." } else { "" };

                    let mut update = StateUpdate::new()
                        .with_message(
                            self.name(),
                            format!(
                                "Dev Implementation Complete. Created {} files: {}{}",
                                valid_files.len(),
                                preview,
                                suffix
                            ),
                        )
                        .with_artifacts(valid_files)
                        .with_next_actor(NextActor::Manager);
                    update.dev_result = Some(result);
                    update.task = Some(task);
                    update
                }
                Err(e) => {
                    error!(error = %e, "Dev implementation failed");
                    failure_update(self.name(), format!("implementation failed: {}", e))
                }
            }
        })
    }
}

/// Tester node: artifacts -> test plan and risk assessment.
pub struct TesterWorker {
    specialist: Arc<dyn TesterSpecialist>,
}

impl TesterWorker {
    pub fn new(specialist: Arc<dyn TesterSpecialist>) -> Self {
        Self { specialist }
    }
}

impl WorkerNode for TesterWorker {
    fn actor(&self) -> NextActor {
        NextActor::Tester
    }

    fn name(&self) -> &'static str {
        "Tester"
    }

    fn run<'a>(&'a self, state: &'a TeamState) -> BoxFuture<'a, StateUpdate> {
        Box::pin(async move {
            let artifacts: Vec<String> = state.artifacts.iter().cloned().collect();
            info!(artifacts = artifacts.len(), "Tester node starting review");

            if artifacts.is_empty() {
                warn!("Tester has no artifacts to review");
                return StateUpdate::new()
                    .with_message(self.name(), "Tester: No artifacts to review.")
                    .with_next_actor(NextActor::Manager);
            }

            let mut context = Vec::new();
            if let Some(ba) = &state.ba_result {
                for story in &ba.user_stories {
                    context.push(format!("User story {}: {} - {}", story.id, story.title, story.description));
                }
            }

            match self
                .specialist
                .review(artifacts, state.project_id.clone(), context)
                .await
            {
                Ok(plan) => {
                    let test_files: Vec<String> =
                        plan.tests.iter().map(|t| t.path.clone()).collect();
                    let concerns = plan.risk_assessment.concerns.len();
                    info!(
                        tests = test_files.len(),
                        concerns,
                        risk = %plan.risk_assessment.level,
                        "Tester review complete"
                    );

                    let mut status_msg =
                        format!("Tester Review Complete. Generated {} test files.", test_files.len());
                    if concerns > 0 {
                        status_msg.push_str(&format!(" Found {} potential issues.", concerns));
                    }

                    let mut update = StateUpdate::new()
                        .with_message(self.name(), status_msg)
                        .with_artifacts(test_files)
                        .with_next_actor(NextActor::Manager);
                    update.tester_result = Some(plan);
                    update
                }
                Err(e) => {
                    error!(error = %e, "Tester review failed");
                    failure_update(self.name(), format!("review failed: {}", e))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        sample_analysis, sample_implementation, sample_test_plan, FailingBa, FailingDev,
        ScriptedBa, ScriptedDev, ScriptedTester,
    };
    use codecrew_core::types::BaOutcome;

    fn state() -> TeamState {
        TeamState::new("build a login system", Some("proj-1".into()), 10)
    }

    #[tokio::test]
    async fn test_ba_success_returns_to_manager() {
        let worker = BaWorker::new(Arc::new(ScriptedBa(BaOutcome::Complete(sample_analysis(
            2,
            &[],
        )))));
        let update = worker.run(&state()).await;

        assert_eq!(update.next_actor, Some(NextActor::Manager));
        assert!(update.ba_result.is_some());
        assert!(update.status.is_none());
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].agent, "BA");
    }

    #[tokio::test]
    async fn test_ba_clarify_sets_waiting_status() {
        let questions = ["Which identity provider?", "Is MFA required?"];
        let worker = BaWorker::new(Arc::new(ScriptedBa(BaOutcome::Clarify(sample_analysis(
            0, &questions,
        )))));
        let update = worker.run(&state()).await;

        assert_eq!(update.status, Some(WorkflowStatus::WaitingForClarification));
        assert_eq!(update.next_actor, Some(NextActor::Manager));
        assert_eq!(
            update.clarifying_questions.as_deref().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_ba_specialist_error_recovered_locally() {
        let worker = BaWorker::new(Arc::new(FailingBa("model unreachable".into())));
        let update = worker.run(&state()).await;

        assert_eq!(update.status, Some(WorkflowStatus::Failed));
        assert_eq!(update.next_actor, Some(NextActor::Manager));
        assert!(update.error_message.as_deref().unwrap().contains("model unreachable"));
    }

    #[tokio::test]
    async fn test_dev_creates_task_and_unions_artifacts() {
        let mut s = state();
        s.apply({
            let mut u = StateUpdate::new();
            u.ba_result = Some(sample_analysis(2, &[]));
            u
        });

        let worker = DevWorker::new(Arc::new(ScriptedDev(sample_implementation(&[
            "src/login.rs",
            "src/auth.rs",
        ]))));
        let update = worker.run(&s).await;

        assert_eq!(update.next_actor, Some(NextActor::Manager));
        assert_eq!(update.artifacts.len(), 2);
        let task = update.task.unwrap();
        assert_eq!(task.user_stories.len(), 2);
        assert!(task.description.contains("BA Analysis:"));
        assert!(update.dev_result.unwrap().success);
    }

    #[tokio::test]
    async fn test_dev_filters_error_entries_from_artifacts() {
        let mut result = sample_implementation(&["src/ok.rs"]);
        result.created_files.push("[ERROR] src/bad.rs: permission denied".into());

        let worker = DevWorker::new(Arc::new(ScriptedDev(result)));
        let update = worker.run(&state()).await;

        assert_eq!(update.artifacts.len(), 1);
        assert!(update.artifacts.contains("src/ok.rs"));
    }

    #[tokio::test]
    async fn test_dev_unsuccessful_result_marks_run_failed() {
        let worker = DevWorker::new(Arc::new(ScriptedDev(
            codecrew_core::types::ImplementationResult::failure("disk full"),
        )));
        let update = worker.run(&state()).await;

        assert_eq!(update.status, Some(WorkflowStatus::Failed));
        assert!(update
            .error_message
            .as_deref()
            .unwrap()
            .contains("disk full"));
        assert_eq!(update.next_actor, Some(NextActor::Manager));
    }

    #[tokio::test]
    async fn test_dev_exception_marks_run_failed() {
        let worker = DevWorker::new(Arc::new(FailingDev("disk full".into())));
        let update = worker.run(&state()).await;
        assert_eq!(update.status, Some(WorkflowStatus::Failed));
        assert!(update.error_message.as_deref().unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn test_tester_skips_when_no_artifacts() {
        let worker = TesterWorker::new(Arc::new(ScriptedTester(sample_test_plan("low", &[]))));
        let update = worker.run(&state()).await;

        assert_eq!(update.next_actor, Some(NextActor::Manager));
        assert!(update.tester_result.is_none());
        assert!(update.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_tester_adds_test_files_to_artifacts() {
        let mut s = state();
        s.apply(StateUpdate::new().with_artifacts(["src/login.rs"]));

        let worker = TesterWorker::new(Arc::new(ScriptedTester(sample_test_plan(
            "low",
            &["tests/login_test.rs"],
        ))));
        let update = worker.run(&s).await;

        assert!(update.artifacts.contains("tests/login_test.rs"));
        assert_eq!(
            update.tester_result.unwrap().risk_assessment.level,
            "low"
        );
    }
}
