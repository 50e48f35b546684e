//! Business Analyst persona.

use futures::future::BoxFuture;
use tracing::info;

use codecrew_core::error::Result;
use codecrew_core::traits::BaSpecialist;
use codecrew_core::types::{BaAnalysis, BaOutcome};
use std::sync::Arc;

use codecrew_llm::chat::extract_json;
use codecrew_llm::{client_for, ChatClient, ChatTurn};

const BA_TEMPERATURE: f32 = 0.5;

const BA_SYSTEM_PROMPT: &str = r#"You are a Business Analyst on a software development team.
Given a user request, produce a requirements analysis as a JSON object:
{
  "title": "short feature title",
  "description": "one-paragraph summary of what is being built",
  "user_stories": [
    {"id": "story-1", "title": "...", "description": "As a ... I want ... so that ...", "acceptance_criteria": ["..."]}
  ],
  "questions": [],
  "priority": "low" | "medium" | "high"
}
If the request is too ambiguous to analyze, put your clarifying questions in
"questions" and leave "user_stories" empty. Respond with JSON only."#;

pub struct LlmBa {
    client: Arc<ChatClient>,
}

impl LlmBa {
    /// Build the BA persona from the shared model settings. Runs hotter
    /// than the router so stories come out less formulaic.
    pub fn new(model: &codecrew_core::config::ModelConfig) -> Self {
        Self {
            client: client_for(&model.with_temperature(BA_TEMPERATURE)),
        }
    }
}

impl BaSpecialist for LlmBa {
    fn analyze(
        &self,
        request: String,
        project_id: Option<String>,
    ) -> BoxFuture<'_, Result<BaOutcome>> {
        Box::pin(async move {
            let mut user_turn = format!("User request:\n{}", request);
            if let Some(project) = &project_id {
                user_turn.push_str(&format!("\n\nProject: {}", project));
            }

            let reply = self
                .client
                .chat(&[ChatTurn::system(BA_SYSTEM_PROMPT), ChatTurn::user(user_turn)])
                .await?;

            let analysis: BaAnalysis = serde_json::from_value(extract_json(&reply)?)?;
            info!(
                stories = analysis.user_stories.len(),
                questions = analysis.questions.len(),
                "BA analysis parsed"
            );

            if analysis.questions.is_empty() {
                Ok(BaOutcome::Complete(analysis))
            } else {
                Ok(BaOutcome::Clarify(analysis))
            }
        })
    }
}
