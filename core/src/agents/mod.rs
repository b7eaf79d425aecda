pub mod diagram_designer;
pub mod manifest;
pub mod planner;
pub mod prompt;

pub use diagram_designer::DiagramDesignerAgent;
pub use manifest::PluginManifest;
pub use planner::PlannerAgent;
pub use prompt::PromptAgent;

use crate::agent::AgentConstructor;
use crate::traits::Provider;
use std::sync::Arc;

/// One entry of the compiled-in agent catalog. `build` returns `None` when
/// the module has nothing registrable.
#[derive(Clone, Copy)]
pub struct BuiltinAgent {
    pub module: &'static str,
    pub build: fn(&Arc<dyn Provider>) -> Option<AgentConstructor>,
}

pub static BUILTIN_AGENTS: &[BuiltinAgent] = &[
    BuiltinAgent {
        module: "planner",
        build: |provider| {
            let provider = provider.clone();
            Some(AgentConstructor::new(move || PlannerAgent::new(provider.clone())))
        },
    },
    BuiltinAgent {
        module: "diagram_designer",
        build: |provider| {
            let provider = provider.clone();
            Some(AgentConstructor::new(move || {
                DiagramDesignerAgent::new(provider.clone())
            }))
        },
    },
];

/// Text following `marker`, or the whole response when the marker is absent.
pub(crate) fn extract_marked<'a>(content: &'a str, marker: &str) -> &'a str {
    match content.find(marker) {
        Some(start) => content[start + marker.len()..].trim(),
        None => content.trim(),
    }
}

/// Structured when the text is JSON, otherwise kept verbatim.
pub(crate) fn artifact_value(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
