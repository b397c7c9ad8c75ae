//! Audit record storage

use crate::{AuditError, AuditRecord, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only audit record storage
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a record
    async fn create(&self, record: &AuditRecord) -> Result<()>;

    /// Most recent records first (if supported)
    async fn list(&self, _limit: usize) -> Result<Vec<AuditRecord>> {
        Err(AuditError::NotSupported)
    }
}

/// In-process audit store.
#[derive(Clone, Default)]
pub struct MemoryAuditStore {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in insertion order
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn create(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let records = self.records.lock().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

/// JSON-lines audit file.
///
/// One record per line, appended and flushed on every write.
pub struct FileAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditStore {
    /// Create a new file store
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use orderhook_audit::FileAuditStore;
    ///
    /// let store = FileAuditStore::new("/var/log/orderhook/audit.jsonl");
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn create(&self, record: &AuditRecord) -> Result<()> {
        let mut line = record.to_json()?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .take(limit)
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }
}

/// Writes every record to several stores.
///
/// Stops at the first failing store.
#[derive(Default)]
pub struct FanoutAuditStore {
    stores: Vec<Arc<dyn AuditStore>>,
}

impl FanoutAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a store
    pub fn with_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.stores.push(store);
        self
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[async_trait]
impl AuditStore for FanoutAuditStore {
    async fn create(&self, record: &AuditRecord) -> Result<()> {
        for store in &self.stores {
            store.create(record).await?;
        }
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        match self.stores.first() {
            Some(store) => store.list(limit).await,
            None => Ok(Vec::new()),
        }
    }
}
