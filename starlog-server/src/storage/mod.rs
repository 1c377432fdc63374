//! Audio storage port
//!
//! Object storage proper is an external collaborator; the pipeline only
//! needs "give me the bytes for this audio reference". The filesystem
//! implementation serves a root-folder deployment and tests.

use async_trait::async_trait;
use starlog_common::Result;
use std::path::PathBuf;
use uuid::Uuid;

/// Audio reference -> raw bytes
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn fetch(&self, owner_id: &str, file_id: Uuid) -> Result<Vec<u8>>;
}

/// Filesystem-backed store: `<audio root>/<file id>.aac`
pub struct FsAudioStore {
    root: PathBuf,
}

impl FsAudioStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, file_id: Uuid) -> PathBuf {
        self.root.join(format!("{file_id}.aac"))
    }
}

#[async_trait]
impl AudioStore for FsAudioStore {
    async fn fetch(&self, _owner_id: &str, file_id: Uuid) -> Result<Vec<u8>> {
        let path = self.path_for(file_id);
        let bytes = tokio::fs::read(&path).await?;
        Ok(bytes)
    }
}
