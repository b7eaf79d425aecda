use crate::traits::{AgentDescriptor, AgentOutput};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Write;

pub const DIAGRAM_SPEC_KEY: &str = "diagram_spec";

/// Per-request state owned by the dispatch loop.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    diagram: Value,
    log: Vec<String>,
    #[serde(skip)]
    roster: Vec<AgentDescriptor>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            diagram: json!({}),
            log: vec![],
            roster: vec![],
        }
    }

    pub fn with_roster(mut self, roster: Vec<AgentDescriptor>) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_diagram(mut self, diagram: Value) -> Self {
        self.diagram = diagram;
        self
    }

    pub fn diagram(&self) -> &Value {
        &self.diagram
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn record(&mut self, agent: &str, output: &AgentOutput) {
        self.push_log(format!("[{}] {}", agent, output.content()));
    }

    /// Copies well-known artifact keys from an agent's metadata into their
    /// slots. Artifacts are replaced wholesale, never merged field by field.
    pub fn merge(&mut self, output: &AgentOutput) -> bool {
        match output.get(DIAGRAM_SPEC_KEY) {
            Some(spec) => {
                self.diagram = spec.clone();
                true
            }
            None => false,
        }
    }

    pub fn roster_listing(&self) -> String {
        let mut listing = String::new();
        for agent in &self.roster {
            let _ = writeln!(listing, "- {}: {}", agent.name, agent.description);
        }
        listing
    }

    /// JSON snapshot of the diagram and log, used inside prompts.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn into_parts(self) -> (Value, Vec<String>) {
        (self.diagram, self.log)
    }
}
