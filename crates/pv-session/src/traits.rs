//! Seams to the collaborators the orchestrator drives.

use crate::session::Identity;
use async_trait::async_trait;
use pv_core::Turn;

/// Chat-completion backend. Any transport or API problem is an error; callers
/// do not inspect the error beyond logging it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn send(&self, context: &[Turn]) -> pv_core::Result<String>;
}

/// Source of the deployment-wide system prompt.
pub trait SystemPrompt: Send + Sync {
    fn get_system_prompt(&self) -> String;

    /// Short human-readable summary of the prompt.
    fn role_description(&self) -> String {
        describe_role(&self.get_system_prompt())
    }
}

/// Durable sink for exchanges that completed successfully.
#[async_trait]
pub trait Transcript: Send + Sync {
    async fn record(&self, identity: &Identity, exchange: &[Turn]) -> anyhow::Result<()>;
}

/// Fixed prompt held in memory.
#[derive(Debug, Clone)]
pub struct StaticPrompt(pub String);

impl SystemPrompt for StaticPrompt {
    fn get_system_prompt(&self) -> String {
        self.0.clone()
    }
}

/// First five non-blank lines of a prompt, or a generic label.
pub fn describe_role(prompt: &str) -> String {
    let lines: Vec<&str> = prompt
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(5)
        .collect();
    if lines.is_empty() {
        "AI Assistant".to_string()
    } else {
        lines.join("\n")
    }
}
