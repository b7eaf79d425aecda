use crate::agent::{Plan, SessionContext};
use crate::traits::{Agent, AgentOutput, ChatMessage, ChatRequest, InputOutcome, Provider};
use async_trait::async_trait;
use std::sync::Arc;

pub const PLANNER_NAME: &str = "Planner";

const SYSTEM_PROMPT: &str = "You are a planning agent responsible for breaking down design tasks and coordinating with other specialized agents.
Your role is to:
1. Break down complex design requests into smaller, manageable tasks
2. Identify which specialized agent should handle each task
3. Maintain the overall design context and ensure consistency
4. Integrate feedback and suggestions from other agents

Be strategic and methodical in your planning. Consider dependencies between tasks and aim for an efficient workflow.";

/// Coordinator. Reads the roster from the session context, asks the
/// provider for a plan and returns it parsed into metadata.
pub struct PlannerAgent {
    provider: Arc<dyn Provider>,
}

impl PlannerAgent {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    fn build_prompt(&self, message: &str, context: &SessionContext) -> String {
        format!(
            "Available agents:
{}
Current request: {}

Current context:
{}

Plan the next steps, considering:
1. What needs to be done next
2. Which agent should handle it
3. What information they need

Respond in a structured format:
NEXT_STEP: (describe the immediate next action)
ASSIGNED_TO: (name of the agent to handle it)
CONTEXT: (relevant context/instructions for the agent)",
            context.roster_listing(),
            message,
            context.render()
        )
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        PLANNER_NAME
    }

    fn description(&self) -> &str {
        "Coordinates the design process by breaking down tasks and delegating to specialized agents"
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
        let plan = Plan::parse(&content);

        Ok(AgentOutput::new(content).with_metadata(plan.to_metadata()))
    }

    fn can_handle_task(&self, _task: &str) -> bool {
        true
    }

    fn handle_input(&self, _content: &str) -> InputOutcome {
        InputOutcome::Unsupported
    }
}
