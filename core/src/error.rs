use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No agent registered with name: {name}")]
    NotFound { name: String },

    #[error("Agent rejected at registration: {reason}")]
    InvalidAgent { reason: String },
}

/// Request-level failures of the dispatch loop. Routing misses and malformed
/// plans never show up here; they are recorded in the session log instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Planner agent '{name}' is not registered")]
    PlannerUnavailable { name: String },

    #[error("Agent '{agent}' failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    pub fn agent(&self) -> Option<&str> {
        match self {
            Self::Agent { agent, .. } => Some(agent),
            Self::PlannerUnavailable { .. } => None,
        }
    }
}
