//! Artifact persistence: screenshots captured per step, stored behind a
//! narrow port and addressed by URL-like references.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error, Clone)]
pub enum ArtifactError {
    #[error("artifact write failed: {0}")]
    WriteFailed(String),

    #[error("artifact not found: {0}")]
    NotFound(String),
}

/// Persist screenshot bytes; returns a retrievable URL-like reference.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(&self, bytes: Vec<u8>) -> Result<String, ArtifactError>;
}

/// Keeps artifacts in memory. Suitable for tests and embedded use.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, reference: &str) -> Result<Vec<u8>, ArtifactError> {
        self.artifacts
            .lock()
            .get(reference)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(reference.to_string()))
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn save(&self, bytes: Vec<u8>) -> Result<String, ArtifactError> {
        let reference = format!("/artifacts/{}.png", Uuid::new_v4());
        self.artifacts.lock().insert(reference.clone(), bytes);
        Ok(reference)
    }
}

/// Writes artifacts under a directory and returns `/screenshots/<file>`
/// references with a cache-busting timestamp, the shape report viewers
/// expect.
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { dir: dir.into() })
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, bytes: Vec<u8>) -> Result<String, ArtifactError> {
        let filename = format!("{}.png", Uuid::new_v4());
        let path = self.dir.join(&filename);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ArtifactError::WriteFailed(e.to_string()))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ArtifactError::WriteFailed(e.to_string()))?;

        debug!(path = %path.display(), size = bytes.len(), "artifact written");

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Ok(format!("/screenshots/{filename}?t={stamp}"))
    }
}
