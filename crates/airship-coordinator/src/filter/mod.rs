//! Filter/predicate builders for fleet selection
//!
//! Each builder accumulates criteria of distinct kinds and combines them
//! as a logical AND of an OR-within-kind: multiple `uuid` values are OR'd
//! together, multiple `host` globs are OR'd together, but an entity must
//! match at least one value of every kind that was given. Negated
//! criteria (`!uuid`, `!state`, ...) exclude anything they match. An
//! empty filter matches everything.
//!
//! Builders serialize losslessly to HTTP query parameters, so the local
//! and remote command paths select identical subsets.

mod agent;
mod coordinator;
mod slot;

pub use agent::{AgentFilterBuilder, AgentPredicate};
pub use coordinator::{CoordinatorFilterBuilder, CoordinatorPredicate};
pub use slot::{SlotFilterBuilder, SlotPredicate};

use airship_core::{AirshipError, AirshipResult};
use uuid::Uuid;

/// Query parameter pairs; a bare flag serializes with an empty value
pub type QueryPairs = Vec<(String, String)>;

/// Expand a short id into the one UUID it prefixes
///
/// A value that parses as a full UUID is used as-is. Otherwise it is
/// matched as a case-insensitive prefix over the known population:
/// more than one hit is an error (the caller's intent is ambiguous),
/// zero hits select nothing.
pub(crate) fn expand_uuid_prefix(
    short_id: &str,
    all_uuids: &[Uuid],
) -> AirshipResult<Option<Uuid>> {
    if let Ok(uuid) = short_id.parse::<Uuid>() {
        return Ok(Some(uuid));
    }
    let prefix = short_id.to_lowercase();
    let matches: Vec<Uuid> = all_uuids
        .iter()
        .filter(|uuid| uuid.to_string().to_lowercase().starts_with(&prefix))
        .copied()
        .collect();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        _ => Err(AirshipError::invalid_spec(format!(
            "ambiguous expansion for id '{short_id}': {matches:?}"
        ))),
    }
}

/// Expand a short id over a population of string identifiers
pub(crate) fn expand_id_prefix(
    short_id: &str,
    all_ids: &[String],
) -> AirshipResult<Option<String>> {
    let prefix = short_id.to_lowercase();
    let matches: Vec<&String> = all_ids
        .iter()
        .filter(|id| id.to_lowercase().starts_with(&prefix))
        .collect();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0].clone())),
        _ => Err(AirshipError::invalid_spec(format!(
            "ambiguous expansion for id '{short_id}': {matches:?}"
        ))),
    }
}
