//! Write-ahead journal and snapshot files for the document store.
//!
//! Every document write is appended to the journal before it becomes visible.
//! A checkpoint writes the full store image to the snapshot file and truncates
//! the journal. Recovery loads the snapshot, then replays the journal on top.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::error::{Result, StoreError};

pub const JOURNAL_FILE: &str = "leaddesk.journal";
pub const SNAPSHOT_FILE: &str = "leaddesk.snapshot";
const SNAPSHOT_VERSION: u32 = 1;

/// Encoded documents of one collection, keyed by document id.
pub type EncodedCollection = BTreeMap<String, Vec<u8>>;

// ============================================================================
// Journal Entry Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    Put {
        collection: String,
        key: String,
        payload: Vec<u8>,
    },
    Remove {
        collection: String,
        key: String,
    },
    Clear {
        collection: String,
    },
}

// ============================================================================
// Store Image
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreImage {
    pub version: u32,
    pub created_at_ms: i64,
    pub collections: BTreeMap<String, EncodedCollection>,
}

impl StoreImage {
    pub fn new(collections: BTreeMap<String, EncodedCollection>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at_ms: Utc::now().timestamp_millis(),
            collections,
        }
    }

    pub fn document_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    pub fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Put {
                collection,
                key,
                payload,
            } => {
                self.collections
                    .entry(collection)
                    .or_default()
                    .insert(key, payload);
            }
            JournalEntry::Remove { collection, key } => {
                if let Some(documents) = self.collections.get_mut(&collection) {
                    documents.remove(&key);
                }
            }
            JournalEntry::Clear { collection } => {
                self.collections.remove(&collection);
            }
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Journal appends are fsynced before the write is acknowledged.
    Sync,
    /// Journal appends are flushed to the OS but not fsynced.
    #[default]
    Async,
    /// No journal; only explicit checkpoints reach disk.
    None,
}

impl std::str::FromStr for DurabilityMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" | "off" => Ok(Self::None),
            other => Err(format!(
                "unknown durability mode '{other}', expected sync, async or none"
            )),
        }
    }
}

// ============================================================================
// Journal
// ============================================================================

pub struct Journal {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl Journal {
    /// `checkpoint_threshold` is the number of appends after which
    /// [`needs_checkpoint`](Self::needs_checkpoint) turns true.
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: DurabilityMode,
        checkpoint_threshold: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = if mode != DurabilityMode::None {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        Ok(Self {
            path,
            file,
            mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: checkpoint_threshold.max(1),
        })
    }

    pub fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let frame = rmp_serde::to_vec(entry).map_err(|e| StoreError::encode("journal entry", e))?;
        let len = u32::try_from(frame.len())
            .map_err(|_| StoreError::encode("journal entry", "entry larger than 4 GiB"))?;
        file.write_all(&len.to_le_bytes())?;
        file.write_all(&frame)?;
        file.flush()?;
        if self.mode == DurabilityMode::Sync {
            file.get_mut().sync_all()?;
        }
        self.entries_since_checkpoint += 1;
        Ok(())
    }

    /// Reads every complete frame. A torn frame at the tail (crash mid-append) ends the read.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut frame = vec![0u8; len];
            match reader.read_exact(&mut frame) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    warn!(path = %self.path.display(), "ignoring torn journal frame at tail");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            let entry: JournalEntry =
                rmp_serde::from_slice(&frame).map_err(|e| StoreError::decode("journal entry", e))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries_since_checkpoint = 0;
        if self.mode == DurabilityMode::None {
            return Ok(());
        }
        self.file = None;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.mode != DurabilityMode::None
            && self.entries_since_checkpoint >= self.checkpoint_threshold
    }
}

// ============================================================================
// Snapshot File
// ============================================================================

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Writes to a temp file in the same directory, then renames over the old snapshot.
    pub fn save(&self, image: &StoreImage) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let encoded = rmp_serde::to_vec(image).map_err(|e| StoreError::encode("snapshot", e))?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&encoded)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoreImage>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut data = Vec::new();
        File::open(&self.path)?.read_to_end(&mut data)?;
        let image: StoreImage =
            rmp_serde::from_slice(&data).map_err(|e| StoreError::decode("snapshot", e))?;
        if image.version != SNAPSHOT_VERSION {
            return Err(StoreError::decode(
                "snapshot",
                format!("unsupported snapshot version {}", image.version),
            ));
        }
        Ok(Some(image))
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    journal: Journal,
    snapshot: SnapshotFile,
}

impl PersistenceManager {
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        mode: DurabilityMode,
        checkpoint_every: usize,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let journal = Journal::open(data_dir.join(JOURNAL_FILE), mode, checkpoint_every)?;
        let snapshot = SnapshotFile::new(data_dir.join(SNAPSHOT_FILE));
        Ok(Self { journal, snapshot })
    }

    pub fn log(&mut self, entry: &JournalEntry) -> Result<()> {
        self.journal.append(entry)
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.journal.needs_checkpoint()
    }

    pub fn checkpoint(&mut self, image: &StoreImage) -> Result<()> {
        self.snapshot.save(image)?;
        self.journal.clear()?;
        info!(documents = image.document_count(), "checkpoint written");
        Ok(())
    }

    /// Snapshot plus replayed journal, or `None` when neither exists.
    pub fn recover(&self) -> Result<Option<StoreImage>> {
        let snapshot = self.snapshot.load()?;
        let entries = self.journal.read_all()?;
        if snapshot.is_none() && entries.is_empty() {
            return Ok(None);
        }

        let mut image = snapshot.unwrap_or_else(|| StoreImage::new(BTreeMap::new()));
        debug!(replayed = entries.len(), "replaying journal");
        for entry in entries {
            image.apply(entry);
        }
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn put(collection: &str, key: &str, payload: &[u8]) -> JournalEntry {
        JournalEntry::Put {
            collection: collection.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn journal_append_and_read() {
        let dir = TempDir::new().unwrap();
        let mut journal =
            Journal::open(dir.path().join("test.journal"), DurabilityMode::Sync, 1000).unwrap();
        journal.append(&put("leads", "a", b"1")).unwrap();
        journal
            .append(&JournalEntry::Remove {
                collection: "leads".into(),
                key: "a".into(),
            })
            .unwrap();
        let entries = journal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], put("leads", "a", b"1"));
    }

    #[test]
    fn torn_tail_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.journal");
        let mut journal = Journal::open(&path, DurabilityMode::Sync, 1000).unwrap();
        journal.append(&put("leads", "a", b"1")).unwrap();
        drop(journal);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&64u32.to_le_bytes()).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();

        let journal = Journal::open(&path, DurabilityMode::Sync, 1000).unwrap();
        assert_eq!(journal.read_all().unwrap().len(), 1);
    }

    #[test]
    fn none_mode_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.journal");
        let mut journal = Journal::open(&path, DurabilityMode::None, 1).unwrap();
        journal.append(&put("leads", "a", b"1")).unwrap();
        assert!(!path.exists());
        assert!(!journal.needs_checkpoint());
    }

    #[test]
    fn checkpoint_clears_journal() {
        let dir = TempDir::new().unwrap();
        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 2).unwrap();
        manager.log(&put("leads", "a", b"1")).unwrap();
        manager.log(&put("leads", "b", b"2")).unwrap();
        assert!(manager.needs_checkpoint());

        let mut image = StoreImage::new(BTreeMap::new());
        image.apply(put("leads", "a", b"1"));
        image.apply(put("leads", "b", b"2"));
        manager.checkpoint(&image).unwrap();

        assert!(!manager.needs_checkpoint());
        assert!(dir.path().join(SNAPSHOT_FILE).exists());
        assert!(manager.journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn recovery_replays_journal_over_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();

        let mut image = StoreImage::new(BTreeMap::new());
        image.apply(put("leads", "a", b"old"));
        image.apply(put("users", "u", b"x"));
        manager.checkpoint(&image).unwrap();

        manager.log(&put("leads", "a", b"new")).unwrap();
        manager
            .log(&JournalEntry::Clear {
                collection: "users".into(),
            })
            .unwrap();
        drop(manager);

        let manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
        let recovered = manager.recover().unwrap().unwrap();
        assert_eq!(recovered.collections["leads"]["a"], b"new".to_vec());
        assert!(!recovered.collections.contains_key("users"));
    }

    #[test]
    fn empty_directory_recovers_to_none() {
        let dir = TempDir::new().unwrap();
        let manager = PersistenceManager::open(dir.path(), DurabilityMode::Async, 10).unwrap();
        assert!(manager.recover().unwrap().is_none());
    }
}
