//! Expected-state persistence
//!
//! The state manager tracks the desired half of the reconciliation model:
//! what each slot *should* be running. The file implementation keeps one
//! JSON document per slot so individual writes stay atomic and cheap; the
//! in-memory implementation serves tests and ephemeral runs.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use airship_core::{AirshipResult, ExpectedSlotStatus};

/// Durable store for expected slot states
#[async_trait]
pub trait StateManager: Send + Sync {
    async fn get_all_expected_states(&self) -> AirshipResult<Vec<ExpectedSlotStatus>>;

    async fn get_expected_state(&self, id: Uuid) -> AirshipResult<Option<ExpectedSlotStatus>>;

    async fn set_expected_state(&self, expected: ExpectedSlotStatus) -> AirshipResult<()>;

    async fn delete_expected_state(&self, id: Uuid) -> AirshipResult<()>;
}

/// In-memory expected-state store
#[derive(Default)]
pub struct InMemoryStateManager {
    states: DashMap<Uuid, ExpectedSlotStatus>,
}

impl InMemoryStateManager {
    pub fn new() -> InMemoryStateManager {
        InMemoryStateManager::default()
    }
}

#[async_trait]
impl StateManager for InMemoryStateManager {
    async fn get_all_expected_states(&self) -> AirshipResult<Vec<ExpectedSlotStatus>> {
        Ok(self.states.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn get_expected_state(&self, id: Uuid) -> AirshipResult<Option<ExpectedSlotStatus>> {
        Ok(self.states.get(&id).map(|entry| entry.value().clone()))
    }

    async fn set_expected_state(&self, expected: ExpectedSlotStatus) -> AirshipResult<()> {
        self.states.insert(expected.id, expected);
        Ok(())
    }

    async fn delete_expected_state(&self, id: Uuid) -> AirshipResult<()> {
        self.states.remove(&id);
        Ok(())
    }
}

/// Expected-state store backed by one JSON file per slot
pub struct FileStateManager {
    directory: PathBuf,
}

impl FileStateManager {
    pub fn new(directory: impl Into<PathBuf>) -> AirshipResult<FileStateManager> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(FileStateManager { directory })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }
}

#[async_trait]
impl StateManager for FileStateManager {
    async fn get_all_expected_states(&self) -> AirshipResult<Vec<ExpectedSlotStatus>> {
        let mut states = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(airship_core::AirshipError::from)
                .and_then(|text| Ok(serde_json::from_str::<ExpectedSlotStatus>(&text)?))
            {
                Ok(state) => states.push(state),
                Err(e) => {
                    // a corrupt record should not take down the whole directory
                    warn!("skipping unreadable expected state {:?}: {e}", path);
                }
            }
        }
        Ok(states)
    }

    async fn get_expected_state(&self, id: Uuid) -> AirshipResult<Option<ExpectedSlotStatus>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn set_expected_state(&self, expected: ExpectedSlotStatus) -> AirshipResult<()> {
        let path = self.path_for(expected.id);
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, serde_json::to_vec_pretty(&expected)?)?;
        std::fs::rename(&temp, &path)?;
        debug!("wrote expected state for {}", expected.id);
        Ok(())
    }

    async fn delete_expected_state(&self, id: Uuid) -> AirshipResult<()> {
        let path = self.path_for(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airship_core::{Assignment, SlotLifecycleState};

    fn expected(state: SlotLifecycleState) -> ExpectedSlotStatus {
        ExpectedSlotStatus::new(
            Uuid::new_v4(),
            state,
            Some(Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()),
        )
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let manager = InMemoryStateManager::new();
        let state = expected(SlotLifecycleState::Running);
        manager.set_expected_state(state.clone()).await.unwrap();

        let loaded = manager.get_expected_state(state.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SlotLifecycleState::Running);

        manager.delete_expected_state(state.id).await.unwrap();
        assert!(manager.get_expected_state(state.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FileStateManager::new(dir.path()).unwrap();

        let a = expected(SlotLifecycleState::Running);
        let b = expected(SlotLifecycleState::Stopped);
        manager.set_expected_state(a.clone()).await.unwrap();
        manager.set_expected_state(b.clone()).await.unwrap();

        let all = manager.get_all_expected_states().await.unwrap();
        assert_eq!(all.len(), 2);

        let loaded = manager.get_expected_state(b.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SlotLifecycleState::Stopped);
        assert_eq!(loaded.assignment(), b.assignment());
    }

    #[tokio::test]
    async fn test_file_overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FileStateManager::new(dir.path()).unwrap();

        let state = expected(SlotLifecycleState::Running);
        manager.set_expected_state(state.clone()).await.unwrap();
        manager
            .set_expected_state(ExpectedSlotStatus::new(
                state.id,
                SlotLifecycleState::Stopped,
                state.assignment(),
            ))
            .await
            .unwrap();

        let all = manager.get_all_expected_states().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, SlotLifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_corrupt_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FileStateManager::new(dir.path()).unwrap();
        manager
            .set_expected_state(expected(SlotLifecycleState::Running))
            .await
            .unwrap();
        std::fs::write(dir.path().join("garbage.json"), b"not json").unwrap();

        let all = manager.get_all_expected_states().await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
