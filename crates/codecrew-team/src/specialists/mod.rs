//! LLM-backed specialist implementations.
//!
//! Each specialist is a persona over the same chat endpoint: its own system
//! prompt and sampling temperature, all responses parsed as JSON. Dev and
//! Tester additionally write files, confined to a per-project directory
//! under the workspace root.

mod ba;
mod dev;
mod tester;

pub use ba::LlmBa;
pub use dev::LlmDev;
pub use tester::LlmTester;

use std::path::{Component, Path, PathBuf};

use codecrew_core::error::{CrewError, Result};

/// Resolve a model-proposed relative path inside the project directory.
///
/// Absolute paths and any `..` component are rejected; the model only ever
/// gets to name files under its own project workspace.
fn resolve_workspace_path(project_dir: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() {
        return Err(CrewError::WorkspacePath(format!(
            "absolute path not allowed: {}",
            rel
        )));
    }
    for component in rel_path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(CrewError::WorkspacePath(format!(
                    "path escapes workspace: {}",
                    rel
                )))
            }
        }
    }
    Ok(project_dir.join(rel_path))
}

/// The directory all of a run's files land in.
fn project_dir(workspace_root: &Path, project_id: Option<&str>) -> PathBuf {
    workspace_root.join(project_id.unwrap_or("default"))
}

/// Write one file under the project directory, creating parents as needed.
fn write_workspace_file(project_dir: &Path, rel: &str, content: &str) -> Result<PathBuf> {
    let path = resolve_workspace_path(project_dir, rel)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    Ok(path)
}
