// Airship Core - Shared types for the Airship deployment platform
//
// This crate holds the value types shared by the coordinator, the
// repository resolvers, and the CLI: artifact coordinates, the immutable
// entity status model, version fingerprinting, and the string utilities
// used to render short human-typable identifiers.

pub mod agent;
pub mod assignment;
pub mod coordinates;
pub mod coordinator;
pub mod error;
pub mod expected;
pub mod glob;
pub mod lifecycle;
pub mod repr;
pub mod slot;
pub mod strings;
pub mod version;

// Re-export core types
pub use agent::AgentStatus;
pub use assignment::{Assignment, Installation};
pub use coordinates::{
    MavenCoordinates, DEFAULT_BINARY_PACKAGING, DEFAULT_CONFIG_PACKAGING,
};
pub use coordinator::CoordinatorStatus;
pub use error::{AirshipError, AirshipResult};
pub use expected::ExpectedSlotStatus;
pub use glob::GlobPredicate;
pub use lifecycle::{AgentLifecycleState, CoordinatorLifecycleState, SlotLifecycleState};
pub use repr::{
    uri_host, AgentRepresentationFactory, AgentStatusRepresentation, AssignmentRepresentation,
    CoordinatorStatusRepresentation, InstallationRepresentation, SlotRepresentationFactory,
    SlotStatusRepresentation, UpgradeVersions,
};
pub use slot::SlotStatus;
pub use strings::{
    common_prefix_segments, safe_truncate, shortest_unique_prefix, trim_leading_segments,
};
pub use version::{
    check_agent_version, check_agents_version, check_slot_version, check_slots_version,
    create_agent_version, create_agents_version, create_coordinator_version, create_slot_version,
    create_slots_version, AIRSHIP_AGENTS_VERSION_HEADER, AIRSHIP_AGENT_VERSION_HEADER,
    AIRSHIP_COORDINATOR_VERSION_HEADER, AIRSHIP_FORCE_HEADER, AIRSHIP_SLOTS_VERSION_HEADER,
    AIRSHIP_SLOT_VERSION_HEADER,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
