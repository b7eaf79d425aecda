//! Scripted collaborators for unit tests.

use crate::agent::SessionContext;
use crate::traits::{
    Agent, AgentOutput, ChatRequest, ChatResponse, InputOutcome, Metadata, Provider,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays canned responses in order and remembers what it was asked.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    failure: Option<String>,
    prompts: Mutex<Vec<String>>,
    systems: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            failure: None,
            prompts: Mutex::new(vec![]),
            systems: Mutex::new(vec![]),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(vec![])
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn systems(&self) -> Vec<String> {
        self.systems.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        for message in request.messages {
            match message.role.as_str() {
                "system" => self.systems.lock().unwrap().push(message.content.clone()),
                _ => self.prompts.lock().unwrap().push(message.content.clone()),
            }
        }

        if let Some(failure) = &self.failure {
            anyhow::bail!("{}", failure);
        }

        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted response left"))?;

        Ok(ChatResponse { text: Some(text) })
    }
}

#[derive(Clone)]
enum Behavior {
    Reply,
    Fail(String),
    Hang,
}

/// Agent with a fixed reply. Clones share one inbox, so tests can see the
/// messages delivered to instances the registry built.
#[derive(Clone)]
pub struct StubAgent {
    name: String,
    description: String,
    content: String,
    metadata: Option<Metadata>,
    accepts_all: bool,
    behavior: Behavior,
    inbox: Arc<Mutex<Vec<String>>>,
}

impl StubAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("{} stub", name),
            content: format!("{} reply", name),
            metadata: None,
            accepts_all: false,
            behavior: Behavior::Reply,
            inbox: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn with_entry(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn accepting_all(mut self) -> Self {
        self.accepts_all = true;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = Behavior::Fail(message.to_string());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.behavior = Behavior::Hang;
        self
    }

    pub fn inbox(&self) -> Arc<Mutex<Vec<String>>> {
        self.inbox.clone()
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn process_message(
        &self,
        message: &str,
        _context: &SessionContext,
    ) -> anyhow::Result<AgentOutput> {
        self.inbox.lock().unwrap().push(message.to_string());

        match &self.behavior {
            Behavior::Reply => {}
            Behavior::Fail(reason) => anyhow::bail!("{}", reason),
            Behavior::Hang => std::future::pending::<()>().await,
        }

        let output = AgentOutput::new(self.content.clone());
        Ok(match &self.metadata {
            Some(metadata) => output.with_metadata(metadata.clone()),
            None => output,
        })
    }

    fn can_handle_task(&self, _task: &str) -> bool {
        self.accepts_all
    }

    fn handle_input(&self, _content: &str) -> InputOutcome {
        InputOutcome::Unsupported
    }
}
