//! Deployment-wide system prompt loaded from a text file.

use parking_lot::RwLock;
use pv_core::PvError;
use pv_session::SystemPrompt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RoleManager {
    path: PathBuf,
    prompt: RwLock<String>,
}

impl RoleManager {
    /// Fails if the file is missing or blank.
    pub fn load(path: impl AsRef<Path>) -> pv_core::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let prompt = read_prompt(&path)?;
        tracing::info!(path = %path.display(), "loaded system prompt");
        Ok(Self { path, prompt: RwLock::new(prompt) })
    }

    /// Re-read the file. On error the previous prompt stays in effect.
    pub fn reload(&self) -> pv_core::Result<bool> {
        let fresh = read_prompt(&self.path)?;
        let mut prompt = self.prompt.write();
        let changed = *prompt != fresh;
        *prompt = fresh;
        tracing::info!(changed, "system prompt reloaded");
        Ok(changed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SystemPrompt for RoleManager {
    fn get_system_prompt(&self) -> String {
        self.prompt.read().clone()
    }
}

fn read_prompt(path: &Path) -> pv_core::Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PvError::Config(format!("cannot read prompt file {}: {e}", path.display()))
    })?;
    let content = content.trim();
    if content.is_empty() {
        return Err(PvError::Config(format!("prompt file is empty: {}", path.display())));
    }
    Ok(content.to_string())
}
