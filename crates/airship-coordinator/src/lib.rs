// Airship Coordinator - fleet orchestration core
//
// The coordinator holds the authoritative in-memory directory of agents,
// slots, and peer coordinators, executes bulk commands against
// predicate-selected fleet subsets, and guards every mutation with
// content-derived version fingerprints.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod filter;
pub mod provision;
pub mod remote;
pub mod state;
pub mod testing;

pub use config::CoordinatorConfig;
pub use coordinator::{BulkResult, Coordinator, TargetFailure};
pub use filter::{
    AgentFilterBuilder, AgentPredicate, CoordinatorFilterBuilder, CoordinatorPredicate,
    SlotFilterBuilder, SlotPredicate,
};
pub use provision::{Instance, Provisioner, StaticProvisioner};
pub use remote::{
    HttpRemoteAgent, HttpRemoteAgentFactory, HttpRemoteSlot, RemoteAgent, RemoteAgentFactory,
    RemoteSlot,
};
pub use state::{FileStateManager, InMemoryStateManager, StateManager};
