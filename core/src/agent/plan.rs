use crate::traits::Metadata;
use serde::{Deserialize, Serialize};

const NEXT_STEP_MARKER: &str = "NEXT_STEP:";
const ASSIGNED_TO_MARKER: &str = "ASSIGNED_TO:";
const CONTEXT_MARKER: &str = "CONTEXT:";

const NEXT_STEP_KEY: &str = "next_step";
const ASSIGNED_TO_KEY: &str = "assigned_to";
const CONTEXT_KEY: &str = "context";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    NextStep,
    AssignedTo,
    Context,
}

/// Routing decision extracted from planner output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Plan {
    /// Best-effort line parser. Text before the first marker is dropped,
    /// unmarked non-empty lines continue the open field, and anything that
    /// does not fit yields missing fields rather than an error.
    pub fn parse(text: &str) -> Self {
        let mut plan = Plan::default();
        let mut current: Option<Field> = None;

        for raw in text.lines() {
            let line = raw.trim_start();

            if let Some((field, rest)) = Self::match_marker(line) {
                current = Some(field);
                *plan.slot(field) = Some(rest.trim().to_string());
            } else if let Some(field) = current {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let slot = plan.slot(field).get_or_insert_with(String::new);
                if !slot.is_empty() {
                    slot.push('\n');
                }
                slot.push_str(line);
            }
        }

        plan.drop_empty();
        plan
    }

    pub fn from_metadata(metadata: Option<&Metadata>) -> Self {
        let Some(metadata) = metadata else {
            return Plan::default();
        };

        let read = |key: &str| {
            metadata
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Plan {
            next_step: read(NEXT_STEP_KEY),
            assigned_to: read(ASSIGNED_TO_KEY),
            context: read(CONTEXT_KEY),
        }
    }

    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        let fields = [
            (NEXT_STEP_KEY, &self.next_step),
            (ASSIGNED_TO_KEY, &self.assigned_to),
            (CONTEXT_KEY, &self.context),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                metadata.insert(key.to_string(), value.clone().into());
            }
        }
        metadata
    }

    pub fn is_empty(&self) -> bool {
        self.next_step.is_none() && self.assigned_to.is_none() && self.context.is_none()
    }

    /// Message handed to the assigned agent.
    pub fn instructions<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.context
            .as_deref()
            .or(self.next_step.as_deref())
            .unwrap_or(fallback)
    }

    fn match_marker(line: &str) -> Option<(Field, &str)> {
        [
            (NEXT_STEP_MARKER, Field::NextStep),
            (ASSIGNED_TO_MARKER, Field::AssignedTo),
            (CONTEXT_MARKER, Field::Context),
        ]
        .into_iter()
        .find_map(|(marker, field)| line.strip_prefix(marker).map(|rest| (field, rest)))
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::NextStep => &mut self.next_step,
            Field::AssignedTo => &mut self.assigned_to,
            Field::Context => &mut self.context,
        }
    }

    fn drop_empty(&mut self) {
        for field in [Field::NextStep, Field::AssignedTo, Field::Context] {
            let slot = self.slot(field);
            if slot.as_deref().is_some_and(|s| s.is_empty()) {
                *slot = None;
            }
        }
    }
}
