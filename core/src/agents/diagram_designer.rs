use super::{artifact_value, extract_marked};
use crate::agent::{DIAGRAM_SPEC_KEY, SessionContext};
use crate::traits::{Agent, AgentOutput, ChatMessage, ChatRequest, InputOutcome, Provider};
use async_trait::async_trait;
use std::sync::Arc;

pub const DIAGRAM_DESIGNER_NAME: &str = "DiagramDesigner";

const DIAGRAM_SPEC_MARKER: &str = "DIAGRAM_SPEC:";

const DIAGRAM_KEYWORDS: &[&str] = &[
    "diagram",
    "draw",
    "visual",
    "layout",
    "component",
    "connection",
    "arrow",
    "box",
    "shape",
    "excalidraw",
];

const SYSTEM_PROMPT: &str = "You are a diagram designer agent that creates and modifies Excalidraw diagrams.
Your role is to:
1. Convert design requirements into visual diagrams
2. Structure components in a clear and logical layout
3. Use appropriate shapes and connectors to show relationships
4. Maintain consistent styling and visual hierarchy

Focus on clarity and simplicity in your diagrams. Use standard shapes and clear labels.
Output diagram specifications in a structured JSON format compatible with Excalidraw.";

pub struct DiagramDesignerAgent {
    provider: Arc<dyn Provider>,
}

impl DiagramDesignerAgent {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    fn build_prompt(&self, message: &str, context: &SessionContext) -> String {
        format!(
            r#"Current diagram state:
{}

Request: {}

Generate an Excalidraw-compatible diagram specification that:
1. Addresses the request
2. Maintains any existing components
3. Uses clear shapes and labels

Output the diagram specification in this format:
DIAGRAM_SPEC: {{
  "elements": [
    {{
      "type": "rectangle|ellipse|diamond|arrow",
      "x": number,
      "y": number,
      "width": number,
      "height": number,
      "label": "string",
      "id": "string"
    }},
    ...
  ]
}}"#,
            context.diagram(),
            message
        )
    }
}

#[async_trait]
impl Agent for DiagramDesignerAgent {
    fn name(&self) -> &str {
        DIAGRAM_DESIGNER_NAME
    }

    fn description(&self) -> &str {
        "Creates and modifies architecture diagrams using Excalidraw"
    }

    async fn process_message(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> anyhow::Result<AgentOutput> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(self.build_prompt(message, context)),
        ];

        let response = self
            .provider
            .chat(ChatRequest {
                messages: &messages,
            })
            .await?;

        let content = response.into_text();
        let spec = artifact_value(extract_marked(&content, DIAGRAM_SPEC_MARKER));

        Ok(AgentOutput::new(content).with_entry(DIAGRAM_SPEC_KEY, spec))
    }

    fn can_handle_task(&self, task: &str) -> bool {
        let task = task.to_lowercase();
        DIAGRAM_KEYWORDS.iter().any(|keyword| task.contains(keyword))
    }

    /// Offline stub: wraps the plan in a placeholder diagram.
    fn handle_input(&self, content: &str) -> InputOutcome {
        InputOutcome::Handled {
            result: format!("DIAGRAM_PLACEHOLDER:\nBased on plan:\n{}", content),
            log: "DiagramDesignerAgent: Created a stub diagram.".to_string(),
        }
    }
}
