//! JSON file plate storage
//!
//! Writes go to a sibling temp file which is then renamed over the target,
//! so a crash mid-write leaves the previous collection intact.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use vpw_common::Result;

use super::PlateStorage;

pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "plates.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PlateStorage for JsonFileStorage {
    async fn read_raw(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_raw(&self, payload: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, payload).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
