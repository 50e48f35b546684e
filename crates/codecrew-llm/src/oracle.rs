//! LLM-backed routing oracle.
//!
//! The supervisor hands the oracle a condensed state digest plus the
//! conversation log and expects a structured `{next_agent, reasoning}`
//! decision back. Malformed output is a parse error, never a guess; the
//! supervisor treats any error here as "oracle unavailable" and falls back
//! to deterministic routing.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use codecrew_core::error::{CrewError, Result};
use codecrew_core::state::StateSummary;
use codecrew_core::traits::DecisionOracle;
use codecrew_core::types::{RouteDecision, TeamMessage};

use crate::chat::{extract_json, ChatClient, ChatTurn};

const ROUTER_SYSTEM_PROMPT: &str = "\
You are the Manager of an AI software team with three specialists:
- ba: Business Analyst. Turns a request into user stories, or asks clarifying questions.
- dev: Developer. Implements code from the analysed requirements.
- tester: QA engineer. Reviews produced files and writes a test plan.

Given the current workflow status, decide who should act next. Typical flow
is ba -> dev -> tester -> FINISH, but you may revisit an agent (e.g. route
back to dev when the tester found problems). Respond with ONLY a JSON
object: {\"next_agent\": \"ba\"|\"dev\"|\"tester\"|\"FINISH\", \"reasoning\": \"...\"}";

const SUMMARIZER_SYSTEM_PROMPT: &str = "\
You are a project manager summarizing the outcome of a multi-agent workflow.
Rewrite the fact sheet you are given as a short, friendly plain-text summary.
Only restate facts from the sheet; never invent files, results or next steps
that are not listed. No markdown.";

/// How many trailing log entries accompany the digest. Older entries add
/// token cost without changing the routing decision.
const LOG_TAIL: usize = 12;

/// [`DecisionOracle`] implementation over an OpenAI-compatible endpoint.
pub struct LlmOracle {
    client: Arc<ChatClient>,
}

impl LlmOracle {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }

    fn decision_messages(summary: &StateSummary, log: &[TeamMessage]) -> Vec<ChatTurn> {
        let mut messages = vec![ChatTurn::system(ROUTER_SYSTEM_PROMPT)];
        let tail = log.len().saturating_sub(LOG_TAIL);
        for entry in &log[tail..] {
            messages.push(ChatTurn::assistant(format!(
                "[{}] {}",
                entry.agent, entry.content
            )));
        }
        messages.push(ChatTurn::user(format!(
            "Current Status:\n{}\n\nWho should act next? Select one: ba, dev, tester, FINISH.",
            summary
        )));
        messages
    }
}

impl DecisionOracle for LlmOracle {
    fn decide(
        &self,
        summary: StateSummary,
        log: Vec<TeamMessage>,
    ) -> BoxFuture<'_, Result<RouteDecision>> {
        Box::pin(async move {
            let messages = Self::decision_messages(&summary, &log);
            let reply = self.client.chat(&messages).await?;
            let decision = parse_route_decision(&reply)?;
            debug!(next_agent = %decision.next_agent, "Oracle routing decision");
            Ok(decision)
        })
    }

    fn elaborate(&self, facts: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let messages = vec![
                ChatTurn::system(SUMMARIZER_SYSTEM_PROMPT),
                ChatTurn::user(facts),
            ];
            self.client.chat(&messages).await
        })
    }
}

/// Parse a routing reply into a [`RouteDecision`].
pub fn parse_route_decision(raw: &str) -> Result<RouteDecision> {
    let value = extract_json(raw)?;
    serde_json::from_value(value).map_err(|e| CrewError::LlmParse(e.to_string()))
}
