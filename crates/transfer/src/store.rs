//! Transfer record persistence.
//!
//! [`RecordStore`] is the single source of truth for retry and resume
//! decisions. Implementations must tolerate concurrent callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use ferry_protocol::{ErrorCode, TransferStatus};
use tracing::debug;

use crate::TransferError;
use crate::record::{RecordDraft, RecordKey, TransferRecord};

/// Persistence for transfer records.
pub trait RecordStore: Send + Sync {
    /// Creates a record with a fresh special id.
    fn create(&self, draft: RecordDraft) -> Result<TransferRecord, TransferError>;

    /// Adopts a record built elsewhere, e.g. a copy fetched from a partner.
    fn insert(&self, record: &TransferRecord) -> Result<(), TransferError>;

    fn load_by_id(&self, key: &RecordKey) -> Result<Option<TransferRecord>, TransferError>;

    /// Replaces the stored copy. Done records and rank regressions of a
    /// running record are rejected.
    fn update(&self, record: &TransferRecord) -> Result<(), TransferError>;

    /// Removes a record. Returns whether it existed.
    fn delete(&self, key: &RecordKey) -> Result<bool, TransferError>;

    fn list(&self) -> Result<Vec<TransferRecord>, TransferError>;

    /// Loads, changes the status, and stores a record.
    fn mark_status(
        &self,
        key: &RecordKey,
        status: TransferStatus,
        code: ErrorCode,
    ) -> Result<TransferRecord, TransferError> {
        let mut record = self
            .load_by_id(key)?
            .ok_or_else(|| TransferError::RecordNotFound(key.clone()))?;
        match status {
            TransferStatus::Done => record.set_done(),
            TransferStatus::Running => record.set_running(),
            TransferStatus::ToSubmit => record.set_to_submit(),
            TransferStatus::InError => record.set_in_error(code, None),
            TransferStatus::Interrupted => record.set_interrupted(code),
        }
        record.error_code = code;
        self.update(&record)?;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Shared table
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct RecordTable {
    records: HashMap<RecordKey, TransferRecord>,
    next_id: i64,
}

impl RecordTable {
    fn from_records(records: Vec<TransferRecord>) -> Self {
        let next_id = records
            .iter()
            .map(|r| r.special_id())
            .max()
            .unwrap_or(0)
            + 1;
        let records = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self { records, next_id }
    }

    fn create(&mut self, draft: RecordDraft) -> TransferRecord {
        self.next_id = self.next_id.max(1);
        let record = draft.into_record(self.next_id);
        self.next_id += 1;
        self.records.insert(record.key.clone(), record.clone());
        record
    }

    fn insert(&mut self, record: &TransferRecord) -> Result<(), TransferError> {
        if self.records.contains_key(&record.key) {
            return Err(TransferError::DuplicateRecord(record.key.clone()));
        }
        self.next_id = self.next_id.max(record.special_id() + 1);
        self.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn update(&mut self, record: &TransferRecord) -> Result<(), TransferError> {
        let stored = self
            .records
            .get(&record.key)
            .ok_or_else(|| TransferError::RecordNotFound(record.key.clone()))?;

        if stored.is_all_done() && stored != record {
            return Err(TransferError::RecordImmutable(record.key.clone()));
        }
        if stored.status == TransferStatus::Running
            && record.status == TransferStatus::Running
            && record.rank < stored.rank
        {
            return Err(TransferError::RankRegression {
                key: record.key.clone(),
                current: stored.rank,
                requested: record.rank,
            });
        }

        self.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn sorted(&self) -> Vec<TransferRecord> {
        let mut all: Vec<TransferRecord> = self.records.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Record store kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    table: RwLock<RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn create(&self, draft: RecordDraft) -> Result<TransferRecord, TransferError> {
        Ok(self.table.write().unwrap().create(draft))
    }

    fn insert(&self, record: &TransferRecord) -> Result<(), TransferError> {
        self.table.write().unwrap().insert(record)
    }

    fn load_by_id(&self, key: &RecordKey) -> Result<Option<TransferRecord>, TransferError> {
        Ok(self.table.read().unwrap().records.get(key).cloned())
    }

    fn update(&self, record: &TransferRecord) -> Result<(), TransferError> {
        self.table.write().unwrap().update(record)
    }

    fn delete(&self, key: &RecordKey) -> Result<bool, TransferError> {
        Ok(self.table.write().unwrap().records.remove(key).is_some())
    }

    fn list(&self) -> Result<Vec<TransferRecord>, TransferError> {
        Ok(self.table.read().unwrap().sorted())
    }
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Record store cached in memory and persisted to a JSON file after every
/// change.
pub struct JsonFileStore {
    path: PathBuf,
    table: RwLock<RecordTable>,
}

impl JsonFileStore {
    /// Opens the store, loading existing records from disk.
    pub fn open(path: PathBuf) -> Result<Self, TransferError> {
        let records = load_records(&path)?;
        Ok(Self {
            path,
            table: RwLock::new(RecordTable::from_records(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the table, persists the copy and only
    /// then makes it current. The write guard is held throughout so
    /// concurrent changes reach the disk in order.
    fn modify<T>(
        &self,
        change: impl FnOnce(&mut RecordTable) -> Result<T, TransferError>,
    ) -> Result<T, TransferError> {
        let mut table = self.table.write().unwrap();
        let mut next = table.clone();
        let value = change(&mut next)?;
        self.persist(&next)?;
        *table = next;
        Ok(value)
    }

    /// Writes `table` next to the store file, then renames it into place.
    fn persist(&self, table: &RecordTable) -> Result<(), TransferError> {
        let records = table.sorted();
        let json = serde_json::to_string_pretty(&records)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("persisted {} record(s) to {:?}", records.len(), self.path);
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn create(&self, draft: RecordDraft) -> Result<TransferRecord, TransferError> {
        self.modify(|table| Ok(table.create(draft)))
    }

    fn insert(&self, record: &TransferRecord) -> Result<(), TransferError> {
        self.modify(|table| table.insert(record))
    }

    fn load_by_id(&self, key: &RecordKey) -> Result<Option<TransferRecord>, TransferError> {
        Ok(self.table.read().unwrap().records.get(key).cloned())
    }

    fn update(&self, record: &TransferRecord) -> Result<(), TransferError> {
        self.modify(|table| table.update(record))
    }

    fn delete(&self, key: &RecordKey) -> Result<bool, TransferError> {
        if !self.table.read().unwrap().records.contains_key(key) {
            return Ok(false);
        }
        self.modify(|table| Ok(table.records.remove(key).is_some()))
    }

    fn list(&self) -> Result<Vec<TransferRecord>, TransferError> {
        Ok(self.table.read().unwrap().sorted())
    }
}

/// Loads records from a JSON file on disk.
fn load_records(path: &Path) -> Result<Vec<TransferRecord>, TransferError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<TransferRecord> = serde_json::from_str(&data)?;
    debug!("loaded {} record(s) from {:?}", records.len(), path);
    Ok(records)
}
