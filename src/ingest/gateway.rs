// src/ingest/gateway.rs
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::ingest::types::NewsRecord;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("record serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where enriched records end up. Reconciling with earlier runs is the
/// gateway's business, not the pipeline's.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save(&self, records: &[NewsRecord]) -> Result<(), PersistenceError>;
}

/// Appends one JSON object per record to a file.
pub struct JsonLinesGateway {
    path: PathBuf,
}

impl JsonLinesGateway {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl PersistenceGateway for JsonLinesGateway {
    async fn save(&self, records: &[NewsRecord]) -> Result<(), PersistenceError> {
        // serialize everything first so a bad record never leaves a half-written batch
        let mut buf = Vec::new();
        for r in records {
            serde_json::to_writer(&mut buf, r)?;
            buf.push(b'\n');
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        f.write_all(&buf).await?;
        f.flush().await?;
        Ok(())
    }
}

/// In-memory gateway: keeps every saved batch. `fail_with` makes every save fail.
#[derive(Default)]
pub struct MemoryGateway {
    pub batches: std::sync::Mutex<Vec<Vec<NewsRecord>>>,
    fail_with: Option<String>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            batches: std::sync::Mutex::new(Vec::new()),
            fail_with: Some(reason.to_string()),
        }
    }

    pub fn saved(&self) -> Vec<NewsRecord> {
        match self.batches.lock() {
            Ok(b) => b.iter().flatten().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().flatten().cloned().collect(),
        }
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn save(&self, records: &[NewsRecord]) -> Result<(), PersistenceError> {
        if let Some(reason) = &self.fail_with {
            return Err(PersistenceError::Unavailable(reason.clone()));
        }
        self.batches
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory gateway poisoned".into()))?
            .push(records.to_vec());
        Ok(())
    }
}
