use crate::agent::{AgentConstructor, AgentRegistry, Plan, SessionContext};
use crate::agents::planner::PLANNER_NAME;
use crate::error::{DispatchError, RegistryError};
use crate::traits::{Agent, AgentOutput};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Start,
    PlannerInvoked,
    Routed,
    AgentInvoked,
    Merged,
    Done,
    Failed,
}

/// Where the planner comes from.
#[derive(Debug, Clone)]
pub enum PlannerSource {
    Registered(String),
    Direct(AgentConstructor),
}

/// How the hop after the planner is chosen.
#[derive(Debug, Clone)]
pub enum Routing {
    /// Parse the planner's output and look `ASSIGNED_TO` up in the registry.
    Planned,
    /// Hand the planner's full text to this agent, no lookup.
    Fixed(AgentConstructor),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub session_id: Uuid,
    pub state: DispatchState,
    /// Every state the session passed through, starting with `Start`.
    pub transitions: Vec<DispatchState>,
    pub content: String,
    pub diagram: serde_json::Value,
    pub log: Vec<String>,
}

impl SessionResult {
    pub fn is_done(&self) -> bool {
        self.state == DispatchState::Done
    }
}

/// One planner call followed by at most one routed agent call.
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    planner: PlannerSource,
    routing: Routing,
}

struct Session {
    id: Uuid,
    state: DispatchState,
    transitions: Vec<DispatchState>,
    context: SessionContext,
}

impl Session {
    fn advance(&mut self, state: DispatchState) {
        debug!(session = %self.id, from = ?self.state, to = ?state, "Dispatch transition");
        self.state = state;
        self.transitions.push(state);
    }

    fn finish(self, content: String) -> SessionResult {
        let (diagram, log) = self.context.into_parts();
        SessionResult {
            session_id: self.id,
            state: self.state,
            transitions: self.transitions,
            content,
            diagram,
            log,
        }
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            planner: PlannerSource::Registered(PLANNER_NAME.to_string()),
            routing: Routing::Planned,
        }
    }

    /// Fixed two-stage chain: planner text goes straight to `worker`.
    pub fn pipeline(
        registry: Arc<AgentRegistry>,
        planner: AgentConstructor,
        worker: AgentConstructor,
    ) -> Self {
        Self::new(registry)
            .with_planner(PlannerSource::Direct(planner))
            .with_routing(Routing::Fixed(worker))
    }

    pub fn with_planner(mut self, planner: PlannerSource) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_routing(mut self, routing: Routing) -> Self {
        self.routing = routing;
        self
    }

    pub async fn run(&self, prompt: &str) -> Result<SessionResult, DispatchError> {
        self.run_until_cancelled(prompt, &CancellationToken::new())
            .await
    }

    /// Runs one session. Cancelling `token` abandons the in-flight agent
    /// call; the session then ends in `Failed` with a warning in its log
    /// instead of returning an error.
    pub async fn run_until_cancelled(
        &self,
        prompt: &str,
        token: &CancellationToken,
    ) -> Result<SessionResult, DispatchError> {
        let mut session = Session {
            id: Uuid::new_v4(),
            state: DispatchState::Start,
            transitions: vec![DispatchState::Start],
            context: SessionContext::new().with_roster(self.registry.descriptors()),
        };
        debug!(session = %session.id, "Dispatch session started");

        let planner = self.resolve_planner()?;
        let Some(plan_output) = self
            .invoke(&mut session, planner.as_ref(), prompt, token)
            .await?
        else {
            return Ok(session.finish(String::new()));
        };
        session.advance(DispatchState::PlannerInvoked);

        let content = plan_output.content().to_string();

        let route = match &self.routing {
            Routing::Fixed(worker) => {
                session.advance(DispatchState::Routed);
                Some((worker.build(), content.clone()))
            }
            Routing::Planned => self.route_plan(&mut session, &plan_output, prompt),
        };

        if let Some((agent, message)) = route {
            let Some(output) = self
                .invoke(&mut session, agent.as_ref(), &message, token)
                .await?
            else {
                return Ok(session.finish(content));
            };
            session.advance(DispatchState::AgentInvoked);

            if session.context.merge(&output) {
                debug!(session = %session.id, agent = agent.name(), "Diagram replaced");
            }
            session.advance(DispatchState::Merged);
        }

        session.advance(DispatchState::Done);
        info!(
            session = %session.id,
            entries = session.context.log().len(),
            "Dispatch session finished"
        );
        Ok(session.finish(content))
    }

    fn resolve_planner(&self) -> Result<Box<dyn Agent>, DispatchError> {
        match &self.planner {
            PlannerSource::Direct(constructor) => Ok(constructor.build()),
            PlannerSource::Registered(name) => self
                .registry
                .lookup(name)
                .map(|c| c.build())
                .map_err(|_| DispatchError::PlannerUnavailable { name: name.clone() }),
        }
    }

    /// Turns planner metadata into the next agent and its message. Returns
    /// `None` when the plan assigns nobody or the assignee is unknown.
    fn route_plan(
        &self,
        session: &mut Session,
        plan_output: &AgentOutput,
        prompt: &str,
    ) -> Option<(Box<dyn Agent>, String)> {
        let plan = Plan::from_metadata(plan_output.metadata());
        let assigned = plan.assigned_to.as_deref()?;
        session.advance(DispatchState::Routed);

        match self.registry.lookup(assigned) {
            Ok(constructor) => Some((constructor.build(), plan.instructions(prompt).to_string())),
            Err(RegistryError::NotFound { name }) => {
                warn!(session = %session.id, agent = %name, "Planner assigned an unknown agent");
                session
                    .context
                    .push_log(format!("Warning: Agent {} not found", name));
                None
            }
            Err(e) => {
                warn!(session = %session.id, "Routing failed: {}", e);
                session.context.push_log(format!("Warning: {}", e));
                None
            }
        }
    }

    /// Calls `process_message` and records the log line. `Ok(None)` means the
    /// token fired first and the session has been marked failed.
    async fn invoke(
        &self,
        session: &mut Session,
        agent: &dyn Agent,
        message: &str,
        token: &CancellationToken,
    ) -> Result<Option<AgentOutput>, DispatchError> {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = agent.process_message(message, &session.context) => Some(result),
        };

        match result {
            None => {
                warn!(session = %session.id, agent = agent.name(), "Session cancelled");
                session.context.push_log(format!(
                    "Warning: session cancelled while waiting on {}",
                    agent.name()
                ));
                session.advance(DispatchState::Failed);
                Ok(None)
            }
            Some(Ok(output)) => {
                session.context.record(agent.name(), &output);
                Ok(Some(output))
            }
            Some(Err(source)) => {
                session.advance(DispatchState::Failed);
                Err(DispatchError::Agent {
                    agent: agent.name().to_string(),
                    source,
                })
            }
        }
    }
}
