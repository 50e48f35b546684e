//! Scripted specialists and oracles for exercising the graph without a
//! model endpoint. Used by the crate's own tests and by integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;

use codecrew_core::error::{CrewError, Result};
use codecrew_core::state::StateSummary;
use codecrew_core::traits::{BaSpecialist, DecisionOracle, DevSpecialist, TesterSpecialist};
use codecrew_core::types::{
    BaAnalysis, BaOutcome, FilePlan, GeneratedFile, ImplementationResult, RiskAssessment,
    RouteDecision, Task, TeamMessage, TestCase, TestFile, TestPlan, UserStory,
};

/// BA that returns a fixed outcome.
pub struct ScriptedBa(pub BaOutcome);

impl BaSpecialist for ScriptedBa {
    fn analyze(
        &self,
        _request: String,
        _project_id: Option<String>,
    ) -> BoxFuture<'_, Result<BaOutcome>> {
        let outcome = self.0.clone();
        Box::pin(async move { Ok(outcome) })
    }
}

/// BA that always errors with the given message.
pub struct FailingBa(pub String);

impl BaSpecialist for FailingBa {
    fn analyze(
        &self,
        _request: String,
        _project_id: Option<String>,
    ) -> BoxFuture<'_, Result<BaOutcome>> {
        let message = self.0.clone();
        Box::pin(async move {
            Err(CrewError::Specialist {
                agent: "ba".into(),
                message,
            })
        })
    }
}

/// Dev that returns a fixed implementation result.
pub struct ScriptedDev(pub ImplementationResult);

impl DevSpecialist for ScriptedDev {
    fn implement(
        &self,
        _task: Task,
        _context: Vec<String>,
    ) -> BoxFuture<'_, Result<ImplementationResult>> {
        let result = self.0.clone();
        Box::pin(async move { Ok(result) })
    }
}

/// Dev that always errors with the given message.
pub struct FailingDev(pub String);

impl DevSpecialist for FailingDev {
    fn implement(
        &self,
        _task: Task,
        _context: Vec<String>,
    ) -> BoxFuture<'_, Result<ImplementationResult>> {
        let message = self.0.clone();
        Box::pin(async move {
            Err(CrewError::Specialist {
                agent: "dev".into(),
                message,
            })
        })
    }
}

/// Tester that returns a fixed test plan.
pub struct ScriptedTester(pub TestPlan);

impl TesterSpecialist for ScriptedTester {
    fn review(
        &self,
        _artifacts: Vec<String>,
        _project_id: Option<String>,
        _context: Vec<String>,
    ) -> BoxFuture<'_, Result<TestPlan>> {
        let plan = self.0.clone();
        Box::pin(async move { Ok(plan) })
    }
}

/// Tester that always errors with the given message.
pub struct FailingTester(pub String);

impl TesterSpecialist for FailingTester {
    fn review(
        &self,
        _artifacts: Vec<String>,
        _project_id: Option<String>,
        _context: Vec<String>,
    ) -> BoxFuture<'_, Result<TestPlan>> {
        let message = self.0.clone();
        Box::pin(async move {
            Err(CrewError::Specialist {
                agent: "tester".into(),
                message,
            })
        })
    }
}

/// Oracle that replays a fixed decision script, then errors once exhausted
/// (so the supervisor degrades to fallback routing).
pub struct ScriptedOracle {
    decisions: Mutex<VecDeque<RouteDecision>>,
    elaboration: Option<String>,
}

impl ScriptedOracle {
    pub fn with_decisions(decisions: Vec<RouteDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            elaboration: None,
        }
    }

    pub fn with_elaboration(mut self, text: impl Into<String>) -> Self {
        self.elaboration = Some(text.into());
        self
    }
}

impl DecisionOracle for ScriptedOracle {
    fn decide(
        &self,
        _summary: StateSummary,
        _log: Vec<TeamMessage>,
    ) -> BoxFuture<'_, Result<RouteDecision>> {
        let next = self
            .decisions
            .lock()
            .expect("decision script poisoned")
            .pop_front();
        Box::pin(async move {
            next.ok_or_else(|| CrewError::OracleUnavailable("decision script exhausted".into()))
        })
    }

    fn elaborate(&self, _facts: String) -> BoxFuture<'_, Result<String>> {
        let text = self.elaboration.clone();
        Box::pin(async move {
            text.ok_or_else(|| CrewError::OracleUnavailable("no scripted elaboration".into()))
        })
    }
}

/// Oracle that is never reachable.
pub struct DownOracle;

impl DecisionOracle for DownOracle {
    fn decide(
        &self,
        _summary: StateSummary,
        _log: Vec<TeamMessage>,
    ) -> BoxFuture<'_, Result<RouteDecision>> {
        Box::pin(async { Err(CrewError::OracleUnavailable("connection refused".into())) })
    }

    fn elaborate(&self, _facts: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async { Err(CrewError::OracleUnavailable("connection refused".into())) })
    }
}

/// Analysis with `story_count` numbered stories; non-empty `questions`
/// makes it suitable for a clarify outcome.
pub fn sample_analysis(story_count: usize, questions: &[&str]) -> BaAnalysis {
    let user_stories = (1..=story_count)
        .map(|n| UserStory {
            id: format!("story-{}", n),
            title: format!("Story {}", n),
            description: format!("As a user I want feature {}", n),
            acceptance_criteria: vec![format!("Feature {} works", n)],
        })
        .collect();
    BaAnalysis {
        title: "Login system".into(),
        description: "Authentication with session handling".into(),
        user_stories,
        questions: questions.iter().map(|q| q.to_string()).collect(),
        priority: Some("high".into()),
    }
}

/// Successful implementation result whose created files are `paths`.
pub fn sample_implementation(paths: &[&str]) -> ImplementationResult {
    ImplementationResult {
        success: true,
        plan: paths
            .iter()
            .map(|p| FilePlan {
                path: p.to_string(),
                summary: format!("Implements {}", p),
            })
            .collect(),
        files: paths
            .iter()
            .map(|p| GeneratedFile {
                path: p.to_string(),
                content: format!("// {}\n", p),
            })
            .collect(),
        explanations: std::collections::HashMap::new(),
        created_files: paths.iter().map(|p| p.to_string()).collect(),
        error: None,
    }
}

/// Test plan at the given risk level with one case per test path.
pub fn sample_test_plan(level: &str, test_paths: &[&str]) -> TestPlan {
    let concerns = if level == "low" {
        vec![]
    } else {
        vec!["error paths not covered".to_string()]
    };
    TestPlan {
        tests: test_paths
            .iter()
            .map(|p| TestFile {
                path: p.to_string(),
                content: format!("// tests for {}\n", p),
                cases: vec![TestCase {
                    name: format!("covers {}", p),
                    description: String::new(),
                    priority: None,
                }],
            })
            .collect(),
        matrix: vec![],
        risk_assessment: RiskAssessment {
            level: level.to_string(),
            concerns,
        },
        validation: None,
    }
}
