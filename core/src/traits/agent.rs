use crate::agent::SessionContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Metadata = HashMap<String, serde_json::Value>;

/// Result of one `process_message` call.
///
/// Fields are read-only once built; the dispatch loop copies what it needs
/// into the session context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentOutput {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

impl AgentOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

/// Outcome of the synchronous `handle_input` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Handled { result: String, log: String },
    Unsupported,
}

impl InputOutcome {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Does one unit of work. The context is borrowed immutably: anything the
    /// agent wants written back goes into the returned metadata.
    async fn process_message(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> anyhow::Result<AgentOutput>;

    fn can_handle_task(&self, task: &str) -> bool;

    fn handle_input(&self, content: &str) -> InputOutcome;

    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}
