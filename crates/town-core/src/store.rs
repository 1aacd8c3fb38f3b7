//! Persistence seam. The engine fires checkpoints at a store without
//! waiting on the result; the sqlite implementation lives in the API
//! crate so the core stays free of database dependencies.

use std::fmt;

use contracts::{ActivityEvent, PersistedWorldState};

#[derive(Debug)]
pub enum StoreError {
    Backend(String),
    /// Stored payload exists but cannot be decoded.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(detail) => write!(f, "store backend error: {detail}"),
            Self::Corrupt(detail) => write!(f, "corrupt stored state: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub trait StateStore: Send + Sync {
    /// Replace the current world checkpoint.
    fn save_state(&self, state: &PersistedWorldState) -> Result<(), StoreError>;

    /// Load the latest checkpoint, `None` on first run.
    fn load_state(&self) -> Result<Option<PersistedWorldState>, StoreError>;

    fn append_activity(&self, event: &ActivityEvent) -> Result<(), StoreError>;

    /// Most recent activity events, newest first.
    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEvent>, StoreError>;
}
