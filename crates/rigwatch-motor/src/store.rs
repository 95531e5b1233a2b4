//! Durable motor position.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MotorError, MotorResult};

/// What survives a process restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPosition {
    pub position: i32,
    pub dirty: bool,
}

pub trait PositionStore: Send + Sync {
    /// Last saved position; a fresh store reports position 0, clean.
    fn load(&self) -> MotorResult<PersistedPosition>;

    fn save(&self, position: PersistedPosition) -> MotorResult<()>;
}

/// JSON file written through a temp file and an atomic rename.
#[derive(Debug, Clone)]
pub struct FilePositionStore {
    path: PathBuf,
}

impl FilePositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PositionStore for FilePositionStore {
    fn load(&self) -> MotorResult<PersistedPosition> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| MotorError::Persist(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(PersistedPosition::default())
            }
            Err(e) => Err(MotorError::Persist(e.to_string())),
        }
    }

    fn save(&self, position: PersistedPosition) -> MotorResult<()> {
        let bytes = serde_json::to_vec(&position).map_err(|e| MotorError::Persist(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| MotorError::Persist(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| MotorError::Persist(e.to_string()))?;
        debug!(position = position.position, dirty = position.dirty, "motor position persisted");
        Ok(())
    }
}

/// In-memory store that keeps every save, for tests and simulation.
#[derive(Debug, Clone, Default)]
pub struct MemoryPositionStore {
    saves: Arc<Mutex<Vec<PersistedPosition>>>,
}

impl MemoryPositionStore {
    pub fn with_initial(position: PersistedPosition) -> Self {
        Self {
            saves: Arc::new(Mutex::new(vec![position])),
        }
    }

    /// Every saved value, oldest first.
    pub fn saves(&self) -> Vec<PersistedPosition> {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PositionStore for MemoryPositionStore {
    fn load(&self) -> MotorResult<PersistedPosition> {
        Ok(self.saves().last().copied().unwrap_or_default())
    }

    fn save(&self, position: PersistedPosition) -> MotorResult<()> {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(position);
        Ok(())
    }
}
