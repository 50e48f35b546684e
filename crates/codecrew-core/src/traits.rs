//! Trait seams between the orchestration core and its collaborators.
//!
//! The core treats each specialist as a black box that always terminates:
//! it either returns a structured result or an error. Routing decisions go
//! through [`DecisionOracle`], which may be absent or fail; the supervisor
//! degrades to deterministic fallback routing in that case.

use futures::future::BoxFuture;

use crate::error::Result;
use crate::state::StateSummary;
use crate::types::{
    BaOutcome, ImplementationResult, RouteDecision, Task, TeamMessage, TestPlan,
};

/// The non-deterministic (LLM-backed) routing decision procedure.
pub trait DecisionOracle: Send + Sync + 'static {
    /// Decide which node acts next given a condensed state digest and the
    /// conversation log.
    fn decide(
        &self,
        summary: StateSummary,
        log: Vec<TeamMessage>,
    ) -> BoxFuture<'_, Result<RouteDecision>>;

    /// Rephrase an already-assembled fact sheet as a natural-language
    /// summary. Must not introduce facts beyond the input.
    fn elaborate(&self, facts: String) -> BoxFuture<'_, Result<String>>;
}

/// Business Analyst capability: requirements analysis.
pub trait BaSpecialist: Send + Sync + 'static {
    fn analyze(
        &self,
        request: String,
        project_id: Option<String>,
    ) -> BoxFuture<'_, Result<BaOutcome>>;
}

/// Developer capability: code generation and file writing.
pub trait DevSpecialist: Send + Sync + 'static {
    fn implement(
        &self,
        task: Task,
        context: Vec<String>,
    ) -> BoxFuture<'_, Result<ImplementationResult>>;
}

/// Tester capability: artifact review and test-plan generation.
pub trait TesterSpecialist: Send + Sync + 'static {
    fn review(
        &self,
        artifacts: Vec<String>,
        project_id: Option<String>,
        context: Vec<String>,
    ) -> BoxFuture<'_, Result<TestPlan>>;
}
