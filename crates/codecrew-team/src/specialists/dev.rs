//! Developer persona: plans files, generates content, writes the workspace.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use codecrew_core::error::Result;
use codecrew_core::traits::DevSpecialist;
use codecrew_core::types::{FilePlan, GeneratedFile, ImplementationResult, Task};
use codecrew_llm::chat::extract_json;
use codecrew_llm::{client_for, ChatClient, ChatTurn};

use super::{project_dir, write_workspace_file};

const DEV_TEMPERATURE: f32 = 0.2;

const DEV_SYSTEM_PROMPT: &str = r#"You are a senior Developer on a software development team.
Given a task and its user stories, plan and generate the implementation as a JSON object:
{
  "plan": [{"path": "relative/path.ext", "summary": "what this file does"}],
  "files": [{"path": "relative/path.ext", "content": "full file content"}],
  "explanations": {"relative/path.ext": "why this file is structured this way"}
}
All paths must be relative to the project root. Generate complete, working
file contents. Respond with JSON only."#;

#[derive(serde::Deserialize)]
struct DevReply {
    #[serde(default)]
    plan: Vec<FilePlan>,
    #[serde(default)]
    files: Vec<GeneratedFile>,
    #[serde(default)]
    explanations: std::collections::HashMap<String, String>,
}

pub struct LlmDev {
    client: Arc<ChatClient>,
    workspace_root: PathBuf,
}

impl LlmDev {
    pub fn new(model: &codecrew_core::config::ModelConfig, workspace_root: PathBuf) -> Self {
        Self {
            client: client_for(&model.with_temperature(DEV_TEMPERATURE)),
            workspace_root,
        }
    }

    fn build_prompt(task: &Task, context: &[String]) -> String {
        let mut prompt = format!("Task: {}\n\nDescription:\n{}", task.title, task.description);
        if !task.user_stories.is_empty() {
            prompt.push_str("\n\nUser stories:");
            for story in &task.user_stories {
                prompt.push_str(&format!("\n- [{}] {}: {}", story.id, story.title, story.description));
                for criterion in &story.acceptance_criteria {
                    prompt.push_str(&format!("\n  * {}", criterion));
                }
            }
        }
        if !context.is_empty() {
            prompt.push_str("\n\nContext:");
            for entry in context {
                prompt.push_str(&format!("\n- {}", entry));
            }
        }
        prompt
    }
}

impl DevSpecialist for LlmDev {
    fn implement(
        &self,
        task: Task,
        context: Vec<String>,
    ) -> BoxFuture<'_, Result<ImplementationResult>> {
        Box::pin(async move {
            let prompt = Self::build_prompt(&task, &context);
            let reply = self
                .client
                .chat(&[ChatTurn::system(DEV_SYSTEM_PROMPT), ChatTurn::user(prompt)])
                .await?;

            let parsed: DevReply = serde_json::from_value(extract_json(&reply)?)?;
            let dir = project_dir(&self.workspace_root, task.project_id.as_deref());

            // Write errors become "[ERROR] ..." entries rather than failing
            // the whole turn; downstream filters them out of the artifacts.
            let mut created_files = Vec::with_capacity(parsed.files.len());
            for file in &parsed.files {
                match write_workspace_file(&dir, &file.path, &file.content) {
                    Ok(_) => created_files.push(file.path.clone()),
                    Err(e) => {
                        warn!(path = %file.path, error = %e, "Failed to write generated file");
                        created_files.push(format!("[ERROR] {}: {}", file.path, e));
                    }
                }
            }

            info!(
                planned = parsed.plan.len(),
                written = created_files.iter().filter(|f| !f.starts_with("[ERROR]")).count(),
                dir = %dir.display(),
                "Dev implementation pass finished"
            );

            Ok(ImplementationResult {
                success: true,
                plan: parsed.plan,
                files: parsed.files,
                explanations: parsed.explanations,
                created_files,
                error: None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecrew_core::types::UserStory;

    #[test]
    fn test_prompt_includes_stories_and_context() {
        let mut task = Task::for_request("build a login system", Some("proj-1"));
        task.user_stories = vec![UserStory {
            id: "story-1".into(),
            title: "Login".into(),
            description: "As a user I want to log in".into(),
            acceptance_criteria: vec!["rejects bad passwords".into()],
        }];
        let prompt = LlmDev::build_prompt(&task, &["Requirement title: Login system".into()]);

        assert!(prompt.contains("[story-1] Login"));
        assert!(prompt.contains("rejects bad passwords"));
        assert!(prompt.contains("Requirement title: Login system"));
    }
}
