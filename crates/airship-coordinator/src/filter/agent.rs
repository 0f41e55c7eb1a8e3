//! Agent selection filters

use airship_core::{
    uri_host, AgentLifecycleState, AgentStatus, AirshipError, AirshipResult, GlobPredicate,
};
use uuid::Uuid;

use super::{expand_id_prefix, expand_uuid_prefix, QueryPairs};

/// Accumulates agent selection criteria
#[derive(Debug, Default, Clone)]
pub struct AgentFilterBuilder {
    uuid_filters: Vec<String>,
    not_uuid_filters: Vec<String>,
    state_filters: Vec<AgentLifecycleState>,
    not_state_filters: Vec<AgentLifecycleState>,
    slot_uuid_filters: Vec<String>,
    not_slot_uuid_filters: Vec<String>,
    host_globs: Vec<String>,
    not_host_globs: Vec<String>,
    machine_globs: Vec<String>,
    not_machine_globs: Vec<String>,
    select_all: bool,
}

impl AgentFilterBuilder {
    pub fn new() -> AgentFilterBuilder {
        AgentFilterBuilder::default()
    }

    pub fn add_uuid_filter(&mut self, short_id: impl Into<String>) -> &mut Self {
        self.uuid_filters.push(short_id.into());
        self
    }

    pub fn add_not_uuid_filter(&mut self, short_id: impl Into<String>) -> &mut Self {
        self.not_uuid_filters.push(short_id.into());
        self
    }

    pub fn add_state_filter(&mut self, state: &str) -> AirshipResult<&mut Self> {
        let state = AgentLifecycleState::lookup(state)
            .ok_or_else(|| AirshipError::invalid_spec(format!("unknown state {state}")))?;
        self.state_filters.push(state);
        Ok(self)
    }

    pub fn add_not_state_filter(&mut self, state: &str) -> AirshipResult<&mut Self> {
        let state = AgentLifecycleState::lookup(state)
            .ok_or_else(|| AirshipError::invalid_spec(format!("unknown state {state}")))?;
        self.not_state_filters.push(state);
        Ok(self)
    }

    pub fn add_slot_uuid_filter(&mut self, short_id: impl Into<String>) -> &mut Self {
        self.slot_uuid_filters.push(short_id.into());
        self
    }

    pub fn add_not_slot_uuid_filter(&mut self, short_id: impl Into<String>) -> &mut Self {
        self.not_slot_uuid_filters.push(short_id.into());
        self
    }

    pub fn add_host_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.host_globs.push(glob.into());
        self
    }

    pub fn add_not_host_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.not_host_globs.push(glob.into());
        self
    }

    pub fn add_machine_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.machine_globs.push(glob.into());
        self
    }

    pub fn add_not_machine_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.not_machine_globs.push(glob.into());
        self
    }

    pub fn select_all(&mut self) -> &mut Self {
        self.select_all = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.select_all
            && self.uuid_filters.is_empty()
            && self.not_uuid_filters.is_empty()
            && self.state_filters.is_empty()
            && self.not_state_filters.is_empty()
            && self.slot_uuid_filters.is_empty()
            && self.not_slot_uuid_filters.is_empty()
            && self.host_globs.is_empty()
            && self.not_host_globs.is_empty()
            && self.machine_globs.is_empty()
            && self.not_machine_globs.is_empty()
    }

    /// Compile against the known agent id and slot UUID populations
    pub fn build(
        &self,
        filter_required: bool,
        all_agent_ids: &[String],
        all_slot_uuids: &[Uuid],
    ) -> AirshipResult<AgentPredicate> {
        if filter_required && self.is_empty() {
            return Err(AirshipError::invalid_spec(
                "no agent filter specified; use --all to select every agent",
            ));
        }

        let mut includes: Vec<Vec<AgentMatcher>> = Vec::new();

        if !self.uuid_filters.is_empty() {
            includes.push(
                self.uuid_filters
                    .iter()
                    .map(|short_id| {
                        Ok(AgentMatcher::AgentId(expand_id_prefix(
                            short_id,
                            all_agent_ids,
                        )?))
                    })
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.state_filters.is_empty() {
            includes.push(
                self.state_filters
                    .iter()
                    .map(|s| AgentMatcher::State(*s))
                    .collect(),
            );
        }
        if !self.slot_uuid_filters.is_empty() {
            includes.push(
                self.slot_uuid_filters
                    .iter()
                    .map(|short_id| {
                        Ok(AgentMatcher::SlotUuid(expand_uuid_prefix(
                            short_id,
                            all_slot_uuids,
                        )?))
                    })
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.host_globs.is_empty() {
            includes.push(
                self.host_globs
                    .iter()
                    .map(|glob| Ok(AgentMatcher::Host(GlobPredicate::new(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.machine_globs.is_empty() {
            includes.push(
                self.machine_globs
                    .iter()
                    .map(|glob| Ok(AgentMatcher::Machine(GlobPredicate::new(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }

        let mut excludes: Vec<AgentMatcher> = Vec::new();
        for short_id in &self.not_uuid_filters {
            excludes.push(AgentMatcher::AgentId(expand_id_prefix(
                short_id,
                all_agent_ids,
            )?));
        }
        excludes.extend(self.not_state_filters.iter().map(|s| AgentMatcher::State(*s)));
        for short_id in &self.not_slot_uuid_filters {
            excludes.push(AgentMatcher::SlotUuid(expand_uuid_prefix(
                short_id,
                all_slot_uuids,
            )?));
        }
        for glob in &self.not_host_globs {
            excludes.push(AgentMatcher::Host(GlobPredicate::new(glob)?));
        }
        for glob in &self.not_machine_globs {
            excludes.push(AgentMatcher::Machine(GlobPredicate::new(glob)?));
        }

        Ok(AgentPredicate {
            select_all: self.select_all,
            includes,
            excludes,
        })
    }

    pub fn to_query(&self) -> QueryPairs {
        let mut pairs = Vec::new();
        for short_id in &self.uuid_filters {
            pairs.push(("uuid".to_string(), short_id.clone()));
        }
        for short_id in &self.not_uuid_filters {
            pairs.push(("!uuid".to_string(), short_id.clone()));
        }
        for state in &self.state_filters {
            pairs.push(("state".to_string(), state.to_string()));
        }
        for state in &self.not_state_filters {
            pairs.push(("!state".to_string(), state.to_string()));
        }
        for short_id in &self.slot_uuid_filters {
            pairs.push(("slotUuid".to_string(), short_id.clone()));
        }
        for short_id in &self.not_slot_uuid_filters {
            pairs.push(("!slotUuid".to_string(), short_id.clone()));
        }
        for glob in &self.host_globs {
            pairs.push(("host".to_string(), glob.clone()));
        }
        for glob in &self.not_host_globs {
            pairs.push(("!host".to_string(), glob.clone()));
        }
        for glob in &self.machine_globs {
            pairs.push(("machine".to_string(), glob.clone()));
        }
        for glob in &self.not_machine_globs {
            pairs.push(("!machine".to_string(), glob.clone()));
        }
        if self.select_all {
            pairs.push(("all".to_string(), String::new()));
        }
        pairs
    }

    pub fn from_query<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> AirshipResult<AgentFilterBuilder> {
        let mut builder = AgentFilterBuilder::new();
        for (key, value) in pairs {
            match key {
                "uuid" => {
                    builder.add_uuid_filter(value);
                }
                "!uuid" => {
                    builder.add_not_uuid_filter(value);
                }
                "state" => {
                    builder.add_state_filter(value)?;
                }
                "!state" => {
                    builder.add_not_state_filter(value)?;
                }
                "slotUuid" => {
                    builder.add_slot_uuid_filter(value);
                }
                "!slotUuid" => {
                    builder.add_not_slot_uuid_filter(value);
                }
                "host" => {
                    builder.add_host_glob_filter(value);
                }
                "!host" => {
                    builder.add_not_host_glob_filter(value);
                }
                "machine" => {
                    builder.add_machine_glob_filter(value);
                }
                "!machine" => {
                    builder.add_not_machine_glob_filter(value);
                }
                "all" => {
                    builder.select_all();
                }
                _ => {}
            }
        }
        Ok(builder)
    }
}

#[derive(Debug, Clone)]
enum AgentMatcher {
    AgentId(Option<String>),
    State(AgentLifecycleState),
    SlotUuid(Option<Uuid>),
    Host(GlobPredicate),
    Machine(GlobPredicate),
}

impl AgentMatcher {
    fn matches(&self, agent: &AgentStatus) -> bool {
        match self {
            AgentMatcher::AgentId(id) => match (id, &agent.agent_id) {
                (Some(id), Some(agent_id)) => id == agent_id,
                _ => false,
            },
            AgentMatcher::State(state) => agent.state == *state,
            AgentMatcher::SlotUuid(uuid) => {
                uuid.map_or(false, |uuid| agent.slots.contains_key(&uuid))
            }
            AgentMatcher::Host(glob) => {
                let external = agent.external_uri.as_deref().and_then(uri_host);
                let internal = agent.internal_uri.as_deref().and_then(uri_host);
                external.map_or(false, |h| glob.matches(&h))
                    || internal.map_or(false, |h| glob.matches(&h))
            }
            AgentMatcher::Machine(glob) => glob.matches(&agent.instance_id),
        }
    }
}

/// Compiled agent predicate
#[derive(Debug, Clone)]
pub struct AgentPredicate {
    select_all: bool,
    includes: Vec<Vec<AgentMatcher>>,
    excludes: Vec<AgentMatcher>,
}

impl AgentPredicate {
    pub fn match_all() -> AgentPredicate {
        AgentPredicate {
            select_all: true,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn matches(&self, agent: &AgentStatus) -> bool {
        let included = self.select_all
            || self
                .includes
                .iter()
                .all(|group| group.iter().any(|matcher| matcher.matches(agent)));
        included && !self.excludes.iter().any(|matcher| matcher.matches(agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airship_core::{Assignment, SlotLifecycleState, SlotStatus};
    use std::collections::BTreeMap;

    fn agent(agent_id: &str, state: AgentLifecycleState, host: &str) -> AgentStatus {
        AgentStatus::new(
            Some(agent_id.to_string()),
            state,
            format!("i-{agent_id}"),
            Some(format!("http://{host}:9999")),
            None,
            Some("/east/a".to_string()),
            None,
            [],
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_matches_everything() {
        let predicate = AgentFilterBuilder::new().build(false, &[], &[]).unwrap();
        assert!(predicate.matches(&agent("a1", AgentLifecycleState::Online, "h1")));
    }

    #[test]
    fn test_state_and_host() {
        let online = agent("a1", AgentLifecycleState::Online, "east.example.com");
        let offline = agent("a2", AgentLifecycleState::Offline, "east.example.com");
        let elsewhere = agent("a3", AgentLifecycleState::Online, "west.example.com");

        let mut builder = AgentFilterBuilder::new();
        builder.add_state_filter("online").unwrap();
        builder.add_host_glob_filter("east.*");
        let predicate = builder.build(false, &[], &[]).unwrap();

        assert!(predicate.matches(&online));
        assert!(!predicate.matches(&offline));
        assert!(!predicate.matches(&elsewhere));
    }

    #[test]
    fn test_agent_id_prefix() {
        let east = agent("agent-east", AgentLifecycleState::Online, "h");
        let west = agent("agent-west", AgentLifecycleState::Online, "h");
        let ids = vec!["agent-east".to_string(), "agent-west".to_string()];

        let mut builder = AgentFilterBuilder::new();
        builder.add_uuid_filter("agent-e");
        let predicate = builder.build(false, &ids, &[]).unwrap();

        assert!(predicate.matches(&east));
        assert!(!predicate.matches(&west));
    }

    #[test]
    fn test_slot_uuid_selects_owning_agent() {
        let slot = SlotStatus::new(
            Uuid::new_v4(),
            None,
            None,
            None,
            "/east/a/apple1",
            SlotLifecycleState::Running,
            Some(Assignment::new("g:apple:1.0", "@prod:apple:1.0").unwrap()),
            None,
            BTreeMap::new(),
        )
        .unwrap();
        let slot_id = slot.id;
        let with_slot = AgentStatus::new(
            Some("a1".to_string()),
            AgentLifecycleState::Online,
            "i-1",
            None,
            None,
            None,
            None,
            vec![slot],
            BTreeMap::new(),
        )
        .unwrap();
        let without = agent("a2", AgentLifecycleState::Online, "h");

        let mut builder = AgentFilterBuilder::new();
        builder.add_slot_uuid_filter(&slot_id.to_string()[..8]);
        let predicate = builder.build(false, &[], &[slot_id]).unwrap();

        assert!(predicate.matches(&with_slot));
        assert!(!predicate.matches(&without));
    }

    #[test]
    fn test_not_state_excludes() {
        let online = agent("a1", AgentLifecycleState::Online, "h");
        let offline = agent("a2", AgentLifecycleState::Offline, "h");

        let mut builder = AgentFilterBuilder::new();
        builder.select_all();
        builder.add_not_state_filter("offline").unwrap();
        let predicate = builder.build(false, &[], &[]).unwrap();

        assert!(predicate.matches(&online));
        assert!(!predicate.matches(&offline));
    }

    #[test]
    fn test_query_round_trip() {
        let mut builder = AgentFilterBuilder::new();
        builder.add_state_filter("online").unwrap();
        builder.add_machine_glob_filter("i-east-*");
        builder.add_not_host_glob_filter("*.staging.*");

        let query = builder.to_query();
        let rebuilt =
            AgentFilterBuilder::from_query(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .unwrap();
        assert_eq!(builder.to_query(), rebuilt.to_query());
    }
}
