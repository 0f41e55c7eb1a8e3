//! Coordinator selection filters

use airship_core::{
    uri_host, AirshipError, AirshipResult, CoordinatorLifecycleState, CoordinatorStatus,
    GlobPredicate,
};

use super::{expand_id_prefix, QueryPairs};

/// Accumulates coordinator selection criteria
#[derive(Debug, Default, Clone)]
pub struct CoordinatorFilterBuilder {
    uuid_filters: Vec<String>,
    not_uuid_filters: Vec<String>,
    state_filters: Vec<CoordinatorLifecycleState>,
    not_state_filters: Vec<CoordinatorLifecycleState>,
    host_globs: Vec<String>,
    not_host_globs: Vec<String>,
    machine_globs: Vec<String>,
    not_machine_globs: Vec<String>,
    select_all: bool,
}

impl CoordinatorFilterBuilder {
    pub fn new() -> CoordinatorFilterBuilder {
        CoordinatorFilterBuilder::default()
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
        let state = CoordinatorLifecycleState::lookup(state)
            .ok_or_else(|| AirshipError::invalid_spec(format!("unknown state {state}")))?;
        self.state_filters.push(state);
        Ok(self)
    }

    pub fn add_not_state_filter(&mut self, state: &str) -> AirshipResult<&mut Self> {
        let state = CoordinatorLifecycleState::lookup(state)
            .ok_or_else(|| AirshipError::invalid_spec(format!("unknown state {state}")))?;
        self.not_state_filters.push(state);
        Ok(self)
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
            && self.host_globs.is_empty()
            && self.not_host_globs.is_empty()
            && self.machine_globs.is_empty()
            && self.not_machine_globs.is_empty()
    }

    pub fn build(
        &self,
        all_coordinator_ids: &[String],
    ) -> AirshipResult<CoordinatorPredicate> {
        let mut includes: Vec<Vec<CoordinatorMatcher>> = Vec::new();

        if !self.uuid_filters.is_empty() {
            includes.push(
                self.uuid_filters
                    .iter()
                    .map(|short_id| {
                        Ok(CoordinatorMatcher::CoordinatorId(expand_id_prefix(
                            short_id,
                            all_coordinator_ids,
                        )?))
                    })
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.state_filters.is_empty() {
            includes.push(
                self.state_filters
                    .iter()
                    .map(|s| CoordinatorMatcher::State(*s))
                    .collect(),
            );
        }
        if !self.host_globs.is_empty() {
            includes.push(
                self.host_globs
                    .iter()
                    .map(|glob| Ok(CoordinatorMatcher::Host(GlobPredicate::new(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.machine_globs.is_empty() {
            includes.push(
                self.machine_globs
                    .iter()
                    .map(|glob| Ok(CoordinatorMatcher::Machine(GlobPredicate::new(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }

        let mut excludes: Vec<CoordinatorMatcher> = Vec::new();
        for short_id in &self.not_uuid_filters {
            excludes.push(CoordinatorMatcher::CoordinatorId(expand_id_prefix(
                short_id,
                all_coordinator_ids,
            )?));
        }
        excludes.extend(
            self.not_state_filters
                .iter()
                .map(|s| CoordinatorMatcher::State(*s)),
        );
        for glob in &self.not_host_globs {
            excludes.push(CoordinatorMatcher::Host(GlobPredicate::new(glob)?));
        }
        for glob in &self.not_machine_globs {
            excludes.push(CoordinatorMatcher::Machine(GlobPredicate::new(glob)?));
        }

        Ok(CoordinatorPredicate {
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
    ) -> AirshipResult<CoordinatorFilterBuilder> {
        let mut builder = CoordinatorFilterBuilder::new();
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
enum CoordinatorMatcher {
    CoordinatorId(Option<String>),
    State(CoordinatorLifecycleState),
    Host(GlobPredicate),
    Machine(GlobPredicate),
}

impl CoordinatorMatcher {
    fn matches(&self, coordinator: &CoordinatorStatus) -> bool {
        match self {
            CoordinatorMatcher::CoordinatorId(id) => match (id, &coordinator.coordinator_id) {
                (Some(id), Some(coordinator_id)) => id == coordinator_id,
                _ => false,
            },
            CoordinatorMatcher::State(state) => coordinator.state == *state,
            CoordinatorMatcher::Host(glob) => {
                let external = coordinator.external_uri.as_deref().and_then(uri_host);
                let internal = coordinator.internal_uri.as_deref().and_then(uri_host);
                external.map_or(false, |h| glob.matches(&h))
                    || internal.map_or(false, |h| glob.matches(&h))
            }
            CoordinatorMatcher::Machine(glob) => glob.matches(&coordinator.instance_id),
        }
    }
}

/// Compiled coordinator predicate
#[derive(Debug, Clone)]
pub struct CoordinatorPredicate {
    select_all: bool,
    includes: Vec<Vec<CoordinatorMatcher>>,
    excludes: Vec<CoordinatorMatcher>,
}

impl CoordinatorPredicate {
    pub fn match_all() -> CoordinatorPredicate {
        CoordinatorPredicate {
            select_all: true,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn matches(&self, coordinator: &CoordinatorStatus) -> bool {
        let included = self.select_all
            || self
                .includes
                .iter()
                .all(|group| group.iter().any(|matcher| matcher.matches(coordinator)));
        included
            && !self
                .excludes
                .iter()
                .any(|matcher| matcher.matches(coordinator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(id: &str, state: CoordinatorLifecycleState) -> CoordinatorStatus {
        CoordinatorStatus::new(
            Some(id.to_string()),
            state,
            format!("i-{id}"),
            Some(format!("http://{id}.example.com:8080")),
            None,
            Some("/east/a".to_string()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_matches_everything() {
        let predicate = CoordinatorFilterBuilder::new().build(&[]).unwrap();
        assert!(predicate.matches(&coordinator("c1", CoordinatorLifecycleState::Online)));
    }

    #[test]
    fn test_id_prefix_and_state() {
        let online = coordinator("coord-east", CoordinatorLifecycleState::Online);
        let offline = coordinator("coord-west", CoordinatorLifecycleState::Offline);
        let ids = vec!["coord-east".to_string(), "coord-west".to_string()];

        let mut builder = CoordinatorFilterBuilder::new();
        builder.add_uuid_filter("coord-e");
        let predicate = builder.build(&ids).unwrap();
        assert!(predicate.matches(&online));
        assert!(!predicate.matches(&offline));

        let mut builder = CoordinatorFilterBuilder::new();
        builder.add_state_filter("offline").unwrap();
        let predicate = builder.build(&ids).unwrap();
        assert!(!predicate.matches(&online));
        assert!(predicate.matches(&offline));
    }

    #[test]
    fn test_query_round_trip() {
        let mut builder = CoordinatorFilterBuilder::new();
        builder.add_uuid_filter("abcd");
        builder.add_state_filter("online").unwrap();
        builder.select_all();

        let query = builder.to_query();
        let rebuilt = CoordinatorFilterBuilder::from_query(
            query.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
        .unwrap();
        assert_eq!(builder.to_query(), rebuilt.to_query());
    }
}
