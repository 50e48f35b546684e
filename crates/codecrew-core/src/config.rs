use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CrewError, Result};

/// Top-level Codecrew configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    #[serde(default)]
    pub team: TeamConfig,
    pub model: ModelConfig,
}

/// Workflow-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Supervisor-turn budget before a run is forced to completion.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Root directory for project workspaces (Dev/Tester file output).
    #[serde(default = "default_workspace")]
    pub workspace: String,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            workspace: default_workspace(),
        }
    }
}

fn default_max_iterations() -> u32 {
    10
}

fn default_workspace() -> String {
    "~/.codecrew/workspaces".to_string()
}

/// LLM endpoint settings shared by the oracle and the specialist personas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint base (e.g. an OpenRouter URL).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.2
}

impl ModelConfig {
    /// A copy of this config with a different sampling temperature
    /// (specialist personas run hotter or colder than the router).
    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self.clone()
        }
    }
}

impl CrewConfig {
    /// Load config from a TOML file, with `${ENV_VAR}` expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| CrewError::ConfigNotFound(path.display().to_string()))?;

        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| CrewError::Config(e.to_string()))
    }

    /// Resolve the workspace root directory (expand ~).
    pub fn workspace_dir(&self) -> PathBuf {
        let ws = &self.team.workspace;
        if let Some(rest) = ws.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(ws)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
