//! Lifecycle state enums for slots, agents, and coordinators
//!
//! Slot states carry optional one-letter shortcodes for compact CLI
//! filtering; lookup is case-insensitive over both the full name and the
//! shortcode.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a deployment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotLifecycleState {
    Stopped,
    Running,
    Restarting,
    Killing,
    Terminated,
    Unknown,
}

impl SlotLifecycleState {
    /// One-letter shortcode, where one exists
    pub fn short_name(&self) -> Option<&'static str> {
        match self {
            SlotLifecycleState::Stopped => Some("s"),
            SlotLifecycleState::Running => Some("r"),
            SlotLifecycleState::Unknown => Some("u"),
            _ => None,
        }
    }

    /// Case-insensitive lookup by full name or shortcode
    pub fn lookup(name: &str) -> Option<SlotLifecycleState> {
        let lower = name.to_lowercase();
        Self::all()
            .iter()
            .find(|state| {
                state.name().to_lowercase() == lower || state.short_name() == Some(lower.as_str())
            })
            .copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            SlotLifecycleState::Stopped => "STOPPED",
            SlotLifecycleState::Running => "RUNNING",
            SlotLifecycleState::Restarting => "RESTARTING",
            SlotLifecycleState::Killing => "KILLING",
            SlotLifecycleState::Terminated => "TERMINATED",
            SlotLifecycleState::Unknown => "UNKNOWN",
        }
    }

    pub fn all() -> &'static [SlotLifecycleState] {
        &[
            SlotLifecycleState::Stopped,
            SlotLifecycleState::Running,
            SlotLifecycleState::Restarting,
            SlotLifecycleState::Killing,
            SlotLifecycleState::Terminated,
            SlotLifecycleState::Unknown,
        ]
    }
}

impl std::fmt::Display for SlotLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of an agent node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentLifecycleState {
    Online,
    Offline,
    Provisioning,
    Terminated,
}

impl AgentLifecycleState {
    pub fn lookup(name: &str) -> Option<AgentLifecycleState> {
        match name.to_lowercase().as_str() {
            "online" => Some(AgentLifecycleState::Online),
            "offline" => Some(AgentLifecycleState::Offline),
            "provisioning" => Some(AgentLifecycleState::Provisioning),
            "terminated" => Some(AgentLifecycleState::Terminated),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentLifecycleState::Online => "ONLINE",
            AgentLifecycleState::Offline => "OFFLINE",
            AgentLifecycleState::Provisioning => "PROVISIONING",
            AgentLifecycleState::Terminated => "TERMINATED",
        }
    }
}

impl std::fmt::Display for AgentLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a coordinator process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorLifecycleState {
    Online,
    Offline,
    Provisioning,
}

impl CoordinatorLifecycleState {
    pub fn lookup(name: &str) -> Option<CoordinatorLifecycleState> {
        match name.to_lowercase().as_str() {
            "online" => Some(CoordinatorLifecycleState::Online),
            "offline" => Some(CoordinatorLifecycleState::Offline),
            "provisioning" => Some(CoordinatorLifecycleState::Provisioning),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CoordinatorLifecycleState::Online => "ONLINE",
            CoordinatorLifecycleState::Offline => "OFFLINE",
            CoordinatorLifecycleState::Provisioning => "PROVISIONING",
        }
    }
}

impl std::fmt::Display for CoordinatorLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_full_name() {
        assert_eq!(
            SlotLifecycleState::lookup("RUNNING"),
            Some(SlotLifecycleState::Running)
        );
        assert_eq!(
            SlotLifecycleState::lookup("terminated"),
            Some(SlotLifecycleState::Terminated)
        );
        assert_eq!(
            SlotLifecycleState::lookup("Restarting"),
            Some(SlotLifecycleState::Restarting)
        );
    }

    #[test]
    fn test_lookup_by_shortcode() {
        assert_eq!(SlotLifecycleState::lookup("s"), Some(SlotLifecycleState::Stopped));
        assert_eq!(SlotLifecycleState::lookup("R"), Some(SlotLifecycleState::Running));
        assert_eq!(SlotLifecycleState::lookup("u"), Some(SlotLifecycleState::Unknown));
        // no shortcode for transient states
        assert_eq!(SlotLifecycleState::lookup("k"), None);
    }

    #[test]
    fn test_lookup_unknown_name() {
        assert_eq!(SlotLifecycleState::lookup("bogus"), None);
        assert_eq!(AgentLifecycleState::lookup("bogus"), None);
    }

    #[test]
    fn test_wire_form_is_upper_case() {
        let json = serde_json::to_string(&SlotLifecycleState::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
        let state: SlotLifecycleState = serde_json::from_str("\"STOPPED\"").unwrap();
        assert_eq!(state, SlotLifecycleState::Stopped);
    }
}
