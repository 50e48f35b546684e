//! Tester persona: reviews written artifacts, generates a test plan.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use codecrew_core::error::Result;
use codecrew_core::traits::TesterSpecialist;
use codecrew_core::types::TestPlan;
use codecrew_llm::chat::extract_json;
use codecrew_llm::{client_for, ChatClient, ChatTurn};

use super::{project_dir, write_workspace_file};

const TESTER_TEMPERATURE: f32 = 0.3;

/// Per-artifact content cap in the review prompt.
const ARTIFACT_PREVIEW_CHARS: usize = 4000;

const TESTER_SYSTEM_PROMPT: &str = r#"You are a QA Engineer on a software development team.
Given implementation files and the user stories they cover, produce a test plan as a JSON object:
{
  "tests": [
    {"path": "tests/relative_path.ext", "content": "full test file content",
     "cases": [{"name": "...", "description": "...", "priority": "low" | "medium" | "high"}]}
  ],
  "matrix": [{"story_id": "story-1", "test_files": ["tests/relative_path.ext"]}],
  "risk_assessment": {"level": "low" | "medium" | "high", "concerns": ["..."]}
}
All paths must be relative to the project root. Respond with JSON only."#;

pub struct LlmTester {
    client: Arc<ChatClient>,
    workspace_root: PathBuf,
}

impl LlmTester {
    pub fn new(model: &codecrew_core::config::ModelConfig, workspace_root: PathBuf) -> Self {
        Self {
            client: client_for(&model.with_temperature(TESTER_TEMPERATURE)),
            workspace_root,
        }
    }
}

impl TesterSpecialist for LlmTester {
    fn review(
        &self,
        artifacts: Vec<String>,
        project_id: Option<String>,
        context: Vec<String>,
    ) -> BoxFuture<'_, Result<TestPlan>> {
        Box::pin(async move {
            let dir = project_dir(&self.workspace_root, project_id.as_deref());

            // Best-effort reads: an unreadable artifact is still listed by
            // path so the model knows it exists.
            let mut prompt = String::from("Files under review:\n");
            for artifact in &artifacts {
                prompt.push_str(&format!("\n--- {} ---\n", artifact));
                match std::fs::read_to_string(dir.join(artifact)) {
                    Ok(content) => {
                        prompt.push_str(&content.chars().take(ARTIFACT_PREVIEW_CHARS).collect::<String>());
                    }
                    Err(e) => {
                        debug!(path = %artifact, error = %e, "Could not read artifact for review");
                        prompt.push_str("(content unavailable)");
                    }
                }
                prompt.push('\n');
            }
            if !context.is_empty() {
                prompt.push_str("\nUser stories:\n");
                for entry in &context {
                    prompt.push_str(&format!("- {}\n", entry));
                }
            }

            let reply = self
                .client
                .chat(&[ChatTurn::system(TESTER_SYSTEM_PROMPT), ChatTurn::user(prompt)])
                .await?;

            let plan: TestPlan = serde_json::from_value(extract_json(&reply)?)?;

            for test in &plan.tests {
                if let Err(e) = write_workspace_file(&dir, &test.path, &test.content) {
                    warn!(path = %test.path, error = %e, "Failed to write test file");
                }
            }

            info!(
                tests = plan.tests.len(),
                risk = %plan.risk_assessment.level,
                concerns = plan.risk_assessment.concerns.len(),
                "Tester review parsed"
            );
            Ok(plan)
        })
    }
}
