//! In-process plate storage for tests and dry runs

use async_trait::async_trait;
use tokio::sync::Mutex;
use vpw_common::Result;

use super::PlateStorage;

#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    payload: Option<String>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing payload, e.g. a legacy or corrupt collection
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                payload: Some(payload.into()),
                writes: 0,
            }),
        }
    }

    pub async fn payload(&self) -> Option<String> {
        self.state.lock().await.payload.clone()
    }

    /// Number of `write_raw` calls so far
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }
}

#[async_trait]
impl PlateStorage for MemoryStorage {
    async fn read_raw(&self) -> Result<Option<String>> {
        Ok(self.state.lock().await.payload.clone())
    }

    async fn write_raw(&self, payload: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.payload = Some(payload.to_string());
        state.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
