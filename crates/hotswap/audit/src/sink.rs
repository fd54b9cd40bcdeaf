//! Audit sinks for storing audit entries

use crate::entry::{AuditEntry, PartialAuditEntry};
use crate::error::Result;
use crate::integrity::IntegrityChain;
use async_trait::async_trait;
use hotswap_types::SubjectId;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Append-only, tamper-evident event sink
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Link `entry` into the chain and persist it
    async fn append(&self, entry: PartialAuditEntry) -> Result<AuditEntry>;

    /// Flush any buffered entries
    async fn flush(&self) -> Result<()>;

    /// Number of entries in the chain
    async fn entry_count(&self) -> Result<u64>;
}

/// In-memory audit sink
#[derive(Default)]
pub struct MemoryAuditSink {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    entries: Vec<AuditEntry>,
    chain: IntegrityChain,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in chain order
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.state.read().entries.clone()
    }

    /// Entries for one subject, in chain order
    pub fn entries_for(&self, subject_id: &SubjectId) -> Vec<AuditEntry> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| &e.subject_id == subject_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, partial: PartialAuditEntry) -> Result<AuditEntry> {
        let mut state = self.state.write();
        let entry = partial.finalize(state.chain.previous_hash());
        state.chain.advance(&entry);
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        Ok(self.state.read().chain.entry_count())
    }
}

/// JSON-lines audit sink with append-only writes
pub struct FileAuditSink {
    path: PathBuf,
    chain: Mutex<IntegrityChain>,
    // Serialises file appends so lines land in chain order.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileAuditSink {
    /// Open (or create) the log at `path`, resuming its chain
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let chain = if tokio::fs::try_exists(&path).await? {
            let entries = read_entries(&path).await?;
            IntegrityChain::from_state(
                entries.last().map(|e| e.entry_hash.clone()),
                entries.len() as u64,
            )
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            IntegrityChain::new()
        };

        Ok(Self {
            path,
            chain: Mutex::new(chain),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back from disk
    pub async fn read_all(&self) -> Result<Vec<AuditEntry>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        read_entries(&self.path).await
    }
}

async fn read_entries(path: &Path) -> Result<Vec<AuditEntry>> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut entries = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }

    Ok(entries)
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, partial: PartialAuditEntry) -> Result<AuditEntry> {
        let _guard = self.write_lock.lock().await;

        let previous_hash = self.chain.lock().previous_hash();
        let entry = partial.finalize(previous_hash);
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        // Only advance once the line is durable.
        self.chain.lock().advance(&entry);
        Ok(entry)
    }

    async fn flush(&self) -> Result<()> {
        // Every append is flushed.
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        Ok(self.chain.lock().entry_count())
    }
}
