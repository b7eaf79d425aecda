pub mod agent;
pub mod agents;
pub mod config;
pub mod error;
pub mod providers;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{
    AgentConstructor, AgentRegistry, DispatchState, Dispatcher, Plan, SessionContext,
    SessionResult,
};
pub use agents::{DiagramDesignerAgent, PlannerAgent, PromptAgent};
pub use config::*;
pub use error::{DispatchError, RegistryError};
pub use providers::*;
pub use traits::*;
