pub mod agent;
pub mod provider;

pub use agent::{Agent, AgentDescriptor, AgentOutput, InputOutcome, Metadata};
pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider};
