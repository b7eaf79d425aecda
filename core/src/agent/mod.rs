pub mod context;
pub mod dispatch;
pub mod plan;
pub mod registry;

pub use context::{DIAGRAM_SPEC_KEY, SessionContext};
pub use dispatch::{DispatchState, Dispatcher, PlannerSource, Routing, SessionResult};
pub use plan::Plan;
pub use registry::{AgentConstructor, AgentRegistry, DiscoveryReport, DiscoverySources};
