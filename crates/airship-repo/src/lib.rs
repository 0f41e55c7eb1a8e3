// Airship Repo - artifact repository resolution
//
// Resolves symbolic binary/config coordinates to concrete, fetchable
// artifact locations. Two backends (standard Maven layout and flat HTTP
// directories) compose through RepositorySet, which treats disagreement
// between backends as a hard ambiguity failure rather than silently
// picking one.

pub mod http;
pub mod install;
pub mod maven;
pub mod repository;
pub mod set;

pub use http::HttpRepository;
pub use install::{
    available_resources, parse_properties, resolve_assignment, resources_are_available,
    to_installation, upgrade_assignment, ConfigEntryReader, HttpConfigEntryReader,
    RESOURCES_ENTRY_NAME,
};
pub use maven::MavenRepository;
pub use repository::Repository;
pub use set::RepositorySet;
