//! Expected slot state - the desired half of the reconciliation model
//!
//! Tracked independently of the agent-reported actual status, so the
//! coordinator can tell an operator what a slot *should* be doing even
//! when the slot has vanished.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assignment::Assignment;
use crate::lifecycle::SlotLifecycleState;

/// Desired lifecycle state and assignment for a slot; identity by id alone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedSlotStatus {
    pub id: Uuid,
    pub status: SlotLifecycleState,
    #[serde(flatten)]
    assignment_fields: AssignmentFields,
}

/// Wire form flattens the assignment into `binary`/`config` fields
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssignmentFields {
    binary: Option<String>,
    config: Option<String>,
}

impl ExpectedSlotStatus {
    pub fn new(id: Uuid, status: SlotLifecycleState, assignment: Option<Assignment>) -> Self {
        let assignment_fields = match assignment {
            Some(assignment) => AssignmentFields {
                binary: Some(assignment.binary),
                config: Some(assignment.config),
            },
            None => AssignmentFields {
                binary: None,
                config: None,
            },
        };
        ExpectedSlotStatus {
            id,
            status,
            assignment_fields,
        }
    }

    pub fn assignment(&self) -> Option<Assignment> {
        match (
            &self.assignment_fields.binary,
            &self.assignment_fields.config,
        ) {
            (Some(binary), Some(config)) => Assignment::new(binary.clone(), config.clone()).ok(),
            _ => None,
        }
    }
}

impl PartialEq for ExpectedSlotStatus {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExpectedSlotStatus {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_id() {
        let id = Uuid::new_v4();
        let a = ExpectedSlotStatus::new(id, SlotLifecycleState::Running, None);
        let b = ExpectedSlotStatus::new(
            id,
            SlotLifecycleState::Stopped,
            Some(Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_wire_form_flattens_assignment() {
        let expected = ExpectedSlotStatus::new(
            Uuid::new_v4(),
            SlotLifecycleState::Running,
            Some(Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()),
        );
        let json = serde_json::to_value(&expected).unwrap();
        assert_eq!(json["binary"], "food.fruit:apple:1.0");
        assert_eq!(json["config"], "@prod:apple:1.0");

        let back: ExpectedSlotStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back.assignment(), expected.assignment());
    }

    #[test]
    fn test_missing_assignment_round_trips() {
        let expected =
            ExpectedSlotStatus::new(Uuid::new_v4(), SlotLifecycleState::Terminated, None);
        let json = serde_json::to_string(&expected).unwrap();
        let back: ExpectedSlotStatus = serde_json::from_str(&json).unwrap();
        assert!(back.assignment().is_none());
    }
}
