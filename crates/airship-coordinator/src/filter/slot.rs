//! Slot selection filters

use airship_core::{
    uri_host, AirshipError, AirshipResult, GlobPredicate, SlotLifecycleState, SlotStatus,
};
use uuid::Uuid;

use super::{expand_uuid_prefix, QueryPairs};

/// Accumulates slot selection criteria
#[derive(Debug, Default, Clone)]
pub struct SlotFilterBuilder {
    state_filters: Vec<SlotLifecycleState>,
    not_state_filters: Vec<SlotLifecycleState>,
    slot_uuid_filters: Vec<String>,
    not_slot_uuid_filters: Vec<String>,
    host_globs: Vec<String>,
    not_host_globs: Vec<String>,
    machine_globs: Vec<String>,
    not_machine_globs: Vec<String>,
    binary_globs: Vec<String>,
    not_binary_globs: Vec<String>,
    config_globs: Vec<String>,
    not_config_globs: Vec<String>,
    select_all: bool,
}

impl SlotFilterBuilder {
    pub fn new() -> SlotFilterBuilder {
        SlotFilterBuilder::default()
    }

    pub fn add_state_filter(&mut self, state: &str) -> AirshipResult<&mut Self> {
        let state = SlotLifecycleState::lookup(state)
            .ok_or_else(|| AirshipError::invalid_spec(format!("unknown state {state}")))?;
        self.state_filters.push(state);
        Ok(self)
    }

    pub fn add_not_state_filter(&mut self, state: &str) -> AirshipResult<&mut Self> {
        let state = SlotLifecycleState::lookup(state)
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

    pub fn add_binary_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.binary_globs.push(glob.into());
        self
    }

    pub fn add_not_binary_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.not_binary_globs.push(glob.into());
        self
    }

    pub fn add_config_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.config_globs.push(glob.into());
        self
    }

    pub fn add_not_config_glob_filter(&mut self, glob: impl Into<String>) -> &mut Self {
        self.not_config_globs.push(glob.into());
        self
    }

    pub fn select_all(&mut self) -> &mut Self {
        self.select_all = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.select_all
            && self.state_filters.is_empty()
            && self.not_state_filters.is_empty()
            && self.slot_uuid_filters.is_empty()
            && self.not_slot_uuid_filters.is_empty()
            && self.host_globs.is_empty()
            && self.not_host_globs.is_empty()
            && self.machine_globs.is_empty()
            && self.not_machine_globs.is_empty()
            && self.binary_globs.is_empty()
            && self.not_binary_globs.is_empty()
            && self.config_globs.is_empty()
            && self.not_config_globs.is_empty()
    }

    /// Compile the accumulated criteria against the known slot population
    pub fn build(
        &self,
        filter_required: bool,
        all_uuids: &[Uuid],
    ) -> AirshipResult<SlotPredicate> {
        if filter_required && self.is_empty() {
            return Err(AirshipError::invalid_spec(
                "no slot filter specified; use --all to select every slot",
            ));
        }

        let mut includes: Vec<Vec<SlotMatcher>> = Vec::new();

        if !self.slot_uuid_filters.is_empty() {
            includes.push(
                self.slot_uuid_filters
                    .iter()
                    .map(|short_id| {
                        Ok(SlotMatcher::Uuid(expand_uuid_prefix(short_id, all_uuids)?))
                    })
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.state_filters.is_empty() {
            includes.push(self.state_filters.iter().map(|s| SlotMatcher::State(*s)).collect());
        }
        if !self.host_globs.is_empty() {
            includes.push(
                self.host_globs
                    .iter()
                    .map(|glob| Ok(SlotMatcher::Host(GlobPredicate::new(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.machine_globs.is_empty() {
            includes.push(
                self.machine_globs
                    .iter()
                    .map(|glob| Ok(SlotMatcher::Machine(GlobPredicate::new(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.binary_globs.is_empty() {
            includes.push(
                self.binary_globs
                    .iter()
                    .map(|glob| Ok(SlotMatcher::Binary(contains_glob(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }
        if !self.config_globs.is_empty() {
            includes.push(
                self.config_globs
                    .iter()
                    .map(|glob| Ok(SlotMatcher::Config(contains_glob(glob)?)))
                    .collect::<AirshipResult<_>>()?,
            );
        }

        let mut excludes: Vec<SlotMatcher> = Vec::new();
        for short_id in &self.not_slot_uuid_filters {
            excludes.push(SlotMatcher::Uuid(expand_uuid_prefix(short_id, all_uuids)?));
        }
        excludes.extend(self.not_state_filters.iter().map(|s| SlotMatcher::State(*s)));
        for glob in &self.not_host_globs {
            excludes.push(SlotMatcher::Host(GlobPredicate::new(glob)?));
        }
        for glob in &self.not_machine_globs {
            excludes.push(SlotMatcher::Machine(GlobPredicate::new(glob)?));
        }
        for glob in &self.not_binary_globs {
            excludes.push(SlotMatcher::Binary(contains_glob(glob)?));
        }
        for glob in &self.not_config_globs {
            excludes.push(SlotMatcher::Config(contains_glob(glob)?));
        }

        Ok(SlotPredicate {
            select_all: self.select_all,
            includes,
            excludes,
        })
    }

    /// Serialize to query parameters; the inverse of `from_query`
    pub fn to_query(&self) -> QueryPairs {
        let mut pairs = Vec::new();
        for glob in &self.binary_globs {
            pairs.push(("binary".to_string(), glob.clone()));
        }
        for glob in &self.not_binary_globs {
            pairs.push(("!binary".to_string(), glob.clone()));
        }
        for glob in &self.config_globs {
            pairs.push(("config".to_string(), glob.clone()));
        }
        for glob in &self.not_config_globs {
            pairs.push(("!config".to_string(), glob.clone()));
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
        for state in &self.state_filters {
            pairs.push(("state".to_string(), state.to_string()));
        }
        for state in &self.not_state_filters {
            pairs.push(("!state".to_string(), state.to_string()));
        }
        for short_id in &self.slot_uuid_filters {
            pairs.push(("uuid".to_string(), short_id.clone()));
        }
        for short_id in &self.not_slot_uuid_filters {
            pairs.push(("!uuid".to_string(), short_id.clone()));
        }
        if self.select_all {
            pairs.push(("all".to_string(), String::new()));
        }
        pairs
    }

    /// Rebuild a builder from query parameters
    pub fn from_query<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> AirshipResult<SlotFilterBuilder> {
        let mut builder = SlotFilterBuilder::new();
        for (key, value) in pairs {
            match key {
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
                "uuid" => {
                    builder.add_slot_uuid_filter(value);
                }
                "!uuid" => {
                    builder.add_not_slot_uuid_filter(value);
                }
                "binary" => {
                    builder.add_binary_glob_filter(value);
                }
                "!binary" => {
                    builder.add_not_binary_glob_filter(value);
                }
                "config" => {
                    builder.add_config_glob_filter(value);
                }
                "!config" => {
                    builder.add_not_config_glob_filter(value);
                }
                "all" => {
                    builder.select_all();
                }
                // unknown parameters belong to other layers
                _ => {}
            }
        }
        Ok(builder)
    }
}

/// Spec globs match anywhere in the spec text
fn contains_glob(glob: &str) -> AirshipResult<GlobPredicate> {
    GlobPredicate::new(&format!("*{glob}*"))
}

/// One compiled criterion
#[derive(Debug, Clone)]
enum SlotMatcher {
    /// None when a short id expanded to nothing: matches no slot
    Uuid(Option<Uuid>),
    State(SlotLifecycleState),
    Host(GlobPredicate),
    Machine(GlobPredicate),
    Binary(GlobPredicate),
    Config(GlobPredicate),
}

impl SlotMatcher {
    fn matches(&self, slot: &SlotStatus) -> bool {
        match self {
            SlotMatcher::Uuid(uuid) => uuid.map_or(false, |uuid| slot.id == uuid),
            SlotMatcher::State(state) => slot.state == *state,
            SlotMatcher::Host(glob) => {
                let external = slot.external_uri.as_deref().and_then(uri_host);
                let internal = slot.self_uri.as_deref().and_then(uri_host);
                external.map_or(false, |h| glob.matches(&h))
                    || internal.map_or(false, |h| glob.matches(&h))
            }
            SlotMatcher::Machine(glob) => slot
                .instance_id
                .as_deref()
                .map_or(false, |id| glob.matches(id)),
            SlotMatcher::Binary(glob) => slot
                .assignment
                .as_ref()
                .map_or(false, |a| glob.matches(&a.binary)),
            SlotMatcher::Config(glob) => slot
                .assignment
                .as_ref()
                .map_or(false, |a| glob.matches(&a.config)),
        }
    }
}

/// Compiled slot predicate: AND of OR-groups, minus exclusions
#[derive(Debug, Clone)]
pub struct SlotPredicate {
    select_all: bool,
    includes: Vec<Vec<SlotMatcher>>,
    excludes: Vec<SlotMatcher>,
}

impl SlotPredicate {
    /// Predicate matching every slot
    pub fn match_all() -> SlotPredicate {
        SlotPredicate {
            select_all: true,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn matches(&self, slot: &SlotStatus) -> bool {
        let included = self.select_all
            || self
                .includes
                .iter()
                .all(|group| group.iter().any(|matcher| matcher.matches(slot)));
        included && !self.excludes.iter().any(|matcher| matcher.matches(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airship_core::Assignment;
    use std::collections::BTreeMap;

    fn slot(state: SlotLifecycleState, host: &str, binary: &str) -> SlotStatus {
        SlotStatus::new(
            Uuid::new_v4(),
            Some(format!("http://{host}:9999/v1/slot/1")),
            Some(format!("http://{host}:9999/v1/slot/1")),
            Some("i-12345".to_string()),
            "/east/a/apple1",
            state,
            Some(Assignment::new(binary, "@prod:apple:1.0").unwrap()),
            None,
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let predicate = SlotFilterBuilder::new().build(false, &[]).unwrap();
        let s = slot(SlotLifecycleState::Running, "agent1.example.com", "food.fruit:apple:1.0");
        assert!(predicate.matches(&s));
    }

    #[test]
    fn test_filter_required() {
        assert!(SlotFilterBuilder::new().build(true, &[]).is_err());
        assert!(SlotFilterBuilder::new().select_all().build(true, &[]).is_ok());
    }

    #[test]
    fn test_or_within_kind() {
        let running = slot(SlotLifecycleState::Running, "a.example.com", "g:apple:1.0");
        let stopped = slot(SlotLifecycleState::Stopped, "a.example.com", "g:apple:1.0");
        let unknown = slot(SlotLifecycleState::Killing, "a.example.com", "g:apple:1.0");

        let mut builder = SlotFilterBuilder::new();
        builder.add_state_filter("running").unwrap();
        builder.add_state_filter("s").unwrap();
        let predicate = builder.build(false, &[]).unwrap();

        assert!(predicate.matches(&running));
        assert!(predicate.matches(&stopped));
        assert!(!predicate.matches(&unknown));
    }

    #[test]
    fn test_and_across_kinds() {
        let match_both = slot(SlotLifecycleState::Running, "a.example.com", "g:apple:1.0");
        let wrong_state = slot(SlotLifecycleState::Stopped, "a.example.com", "g:apple:1.0");
        let wrong_host = slot(SlotLifecycleState::Running, "b.example.org", "g:apple:1.0");

        let uuids = vec![match_both.id, wrong_state.id, wrong_host.id];
        let mut builder = SlotFilterBuilder::new();
        builder.add_state_filter("running").unwrap();
        builder.add_host_glob_filter("*.example.com");
        let predicate = builder.build(false, &uuids).unwrap();

        assert!(predicate.matches(&match_both));
        assert!(!predicate.matches(&wrong_state));
        assert!(!predicate.matches(&wrong_host));
    }

    #[test]
    fn test_uuid_and_state_intersection() {
        let x = slot(SlotLifecycleState::Running, "a.example.com", "g:apple:1.0");
        let y = slot(SlotLifecycleState::Stopped, "a.example.com", "g:apple:1.0");
        let z = slot(SlotLifecycleState::Running, "a.example.com", "g:apple:1.0");
        let uuids = vec![x.id, y.id, z.id];

        let mut builder = SlotFilterBuilder::new();
        builder.add_slot_uuid_filter(x.id.to_string());
        builder.add_slot_uuid_filter(y.id.to_string());
        builder.add_state_filter("running").unwrap();
        let predicate = builder.build(false, &uuids).unwrap();

        assert!(predicate.matches(&x));
        assert!(!predicate.matches(&y), "state filter must exclude y");
        assert!(!predicate.matches(&z), "uuid filter must exclude z");
    }

    #[test]
    fn test_exclusion() {
        let apple = slot(SlotLifecycleState::Running, "a.example.com", "g:apple:1.0");
        let banana = slot(SlotLifecycleState::Running, "a.example.com", "g:banana:1.0");

        let mut builder = SlotFilterBuilder::new();
        builder.select_all();
        builder.add_not_binary_glob_filter("banana");
        let predicate = builder.build(false, &[]).unwrap();

        assert!(predicate.matches(&apple));
        assert!(!predicate.matches(&banana));
    }

    #[test]
    fn test_binary_glob_is_contains() {
        let s = slot(SlotLifecycleState::Running, "a.example.com", "food.fruit:apple:1.0");
        let mut builder = SlotFilterBuilder::new();
        builder.add_binary_glob_filter("apple");
        assert!(builder.build(false, &[]).unwrap().matches(&s));
    }

    #[test]
    fn test_short_uuid_expansion_in_filter() {
        let s = slot(SlotLifecycleState::Running, "a.example.com", "g:apple:1.0");
        let prefix = &s.id.to_string()[..6];
        let mut builder = SlotFilterBuilder::new();
        builder.add_slot_uuid_filter(prefix);
        let predicate = builder.build(false, &[s.id]).unwrap();
        assert!(predicate.matches(&s));
    }

    #[test]
    fn test_query_round_trip_selects_same_subset() {
        let slots: Vec<SlotStatus> = vec![
            slot(SlotLifecycleState::Running, "a.example.com", "g:apple:1.0"),
            slot(SlotLifecycleState::Stopped, "b.example.com", "g:banana:1.0"),
            slot(SlotLifecycleState::Running, "c.example.org", "g:apple:2.0"),
        ];
        let uuids: Vec<Uuid> = slots.iter().map(|s| s.id).collect();

        let mut builder = SlotFilterBuilder::new();
        builder.add_state_filter("running").unwrap();
        builder.add_host_glob_filter("*.example.com");
        builder.add_not_binary_glob_filter("banana");

        let query = builder.to_query();
        let rebuilt =
            SlotFilterBuilder::from_query(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .unwrap();

        let a = builder.build(false, &uuids).unwrap();
        let b = rebuilt.build(false, &uuids).unwrap();
        for s in &slots {
            assert_eq!(a.matches(s), b.matches(s));
        }
    }
}
