use super::{PluginManifest, artifact_value, extract_marked};
use crate::agent::SessionContext;
use crate::traits::{Agent, AgentOutput, ChatMessage, ChatRequest, InputOutcome, Provider};
use async_trait::async_trait;
use std::sync::Arc;

/// Plugin agent driven entirely by its manifest.
pub struct PromptAgent {
    manifest: Arc<PluginManifest>,
    provider: Arc<dyn Provider>,
}

impl PromptAgent {
    pub fn new(manifest: Arc<PluginManifest>, provider: Arc<dyn Provider>) -> Self {
        Self { manifest, provider }
    }

    fn build_prompt(&self, message: &str, context: &SessionContext) -> String {
        let mut prompt = format!(
            "Current diagram state:\n{}\n\nRequest: {}",
            context.diagram(),
            message
        );
        if let Some(marker) = &self.manifest.marker {
            prompt.push_str(&format!(
                "\n\nPut your final result after a line starting with {}",
                marker
            ));
        }
        prompt
    }
}

#[async_trait]
impl Agent for PromptAgent {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    async fn process_message(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> anyhow::Result<AgentOutput> {
        let mut messages = vec![];
        if !self.manifest.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.manifest.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(self.build_prompt(message, context)));

        let response = self
            .provider
            .chat(ChatRequest {
                messages: &messages,
            })
            .await?;
        let content = response.into_text();

        let output = match &self.manifest.output_key {
            Some(key) => {
                let section = match &self.manifest.marker {
                    Some(marker) => extract_marked(&content, marker),
                    None => content.trim(),
                };
                let value = artifact_value(section);
                AgentOutput::new(content.clone()).with_entry(key.clone(), value)
            }
            None => AgentOutput::new(content),
        };

        Ok(output)
    }

    fn can_handle_task(&self, task: &str) -> bool {
        let task = task.to_lowercase();
        self.manifest
            .keywords
            .iter()
            .any(|keyword| task.contains(keyword.as_str()))
    }

    fn handle_input(&self, _content: &str) -> InputOutcome {
        InputOutcome::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DIAGRAM_SPEC_KEY;
    use crate::testing::ScriptedProvider;
    use serde_json::json;
    use std::path::Path;

    fn manifest(frontmatter: &str) -> Arc<PluginManifest> {
        let content = format!("---\n{}\n---\nYou are a layout specialist.\n", frontmatter);
        Arc::new(PluginManifest::parse(&content, Path::new("AGENT.md")).unwrap())
    }

    #[tokio::test]
    async fn can_write_the_diagram_slot() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Rearranged.\nLAYOUT: {\"elements\": []}",
        ]));
        let agent = PromptAgent::new(
            manifest(
                "name: Layout\ndescription: Tidies layouts\noutput_key: diagram_spec\nmarker: \"LAYOUT:\"",
            ),
            provider.clone(),
        );

        let output = agent
            .process_message("tidy up", &SessionContext::new())
            .await
            .unwrap();

        assert_eq!(output.get(DIAGRAM_SPEC_KEY), Some(&json!({"elements": []})));
        assert_eq!(provider.systems()[0], "You are a layout specialist.");
    }

    #[tokio::test]
    async fn plain_output_without_key() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Looks fine."]));
        let agent = PromptAgent::new(
            manifest("name: Critic\ndescription: Reviews"),
            provider,
        );

        let output = agent
            .process_message("review", &SessionContext::new())
            .await
            .unwrap();

        assert_eq!(output.content(), "Looks fine.");
        assert!(output.metadata().is_none());
    }

    #[test]
    fn keywords_drive_task_affinity() {
        let agent = PromptAgent::new(
            manifest("name: Critic\ndescription: Reviews\nkeywords: [review, critique]"),
            Arc::new(ScriptedProvider::new(vec![])),
        );
        assert!(agent.can_handle_task("Please REVIEW the design"));
        assert!(!agent.can_handle_task("draw boxes"));
        assert!(!agent.handle_input("x").is_supported());
    }
}
