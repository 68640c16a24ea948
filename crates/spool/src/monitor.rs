//! Directory polling with change detection.
//!
//! A file becomes valid only once it has stopped changing: first seen with
//! a modification time, then hashed when that time held for one tick, then
//! valid when the hash held for another tick. Valid files are marked used
//! until they change again.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Local, NaiveDate, Utc};
use ferry_transfer::calculate_file_checksum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SpoolArguments;
use crate::error::SpoolError;

/// Lock polling intervals to wait for a competing instance.
const LOCK_WAIT_TICKS: u32 = 10;

/// One watched file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Modification time in milliseconds since the epoch.
    pub last_modified: i64,
    pub size: u64,
    /// Already dispatched; ignored until it changes.
    #[serde(default)]
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_used: Option<DateTime<Utc>>,
    /// Record of the last dispatch, reused when the file comes back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_id: Option<i64>,
}

impl FileItem {
    fn new(path: PathBuf, last_modified: i64, size: u64) -> Self {
        Self {
            path,
            hash: None,
            last_modified,
            size,
            used: false,
            time_used: None,
            special_id: None,
        }
    }
}

/// Dispatch results, overall and for the current day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub global_ok: u64,
    pub global_error: u64,
    pub today_ok: u64,
    pub today_error: u64,
    pub today: NaiveDate,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            global_ok: 0,
            global_error: 0,
            today_ok: 0,
            today_error: 0,
            today: Local::now().date_naive(),
        }
    }
}

impl Counters {
    fn record(&mut self, success: bool, date: NaiveDate) {
        if date != self.today {
            self.today = date;
            self.today_ok = 0;
            self.today_error = 0;
        }
        if success {
            self.global_ok += 1;
            self.today_ok += 1;
        } else {
            self.global_error += 1;
            self.today_error += 1;
        }
    }
}

/// Status summary sent to an observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub name: String,
    /// `items` is the whole set rather than the changes since the last
    /// delivered summary.
    pub full: bool,
    pub items: Vec<FileItem>,
    #[serde(default)]
    pub removed: Vec<PathBuf>,
    pub counters: Counters,
    pub generated_at: DateTime<Utc>,
}

/// What the status file holds.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    items: Vec<FileItem>,
    #[serde(default)]
    counters: Counters,
}

pub struct FileMonitor {
    name: String,
    directories: Vec<PathBuf>,
    status_file: PathBuf,
    lock_file: PathBuf,
    stop_file: PathBuf,
    filter: Option<Regex>,
    minimal_size: u64,
    recursive: bool,
    elapse: Duration,
    items: BTreeMap<PathBuf, FileItem>,
    counters: Counters,
    /// Per observer, the items as of the last delivered summary.
    delivered: HashMap<String, BTreeMap<PathBuf, FileItem>>,
    forced_full: HashSet<String>,
    dirty: bool,
}

impl FileMonitor {
    /// Builds a monitor and reloads the items saved by a previous run.
    pub fn new(args: &SpoolArguments) -> Result<Self, SpoolError> {
        let filter = args.regex.as_deref().map(Regex::new).transpose()?;
        let mut lock_name = args.status_file.clone().into_os_string();
        lock_name.push(".chk");

        let mut monitor = Self {
            name: args.name.clone(),
            directories: args.directories.clone(),
            status_file: args.status_file.clone(),
            lock_file: PathBuf::from(lock_name),
            stop_file: args.stop_file.clone(),
            filter,
            minimal_size: args.minimal_size,
            recursive: args.recursive,
            elapse: args.elapse(),
            items: BTreeMap::new(),
            counters: Counters::default(),
            delivered: HashMap::new(),
            forced_full: HashSet::new(),
            dirty: false,
        };
        monitor.load_status();
        Ok(monitor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    pub fn items(&self) -> impl Iterator<Item = &FileItem> {
        self.items.values()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    // -----------------------------------------------------------------------
    // Lock
    // -----------------------------------------------------------------------

    /// Claims the status file. A lock left behind is removed; if it comes
    /// back within ten polling intervals, another instance is alive.
    ///
    /// Returns `false` without claiming anything when `cancel` fires or the
    /// stop file appears during that wait.
    pub async fn acquire_lock(&self, cancel: &CancellationToken) -> Result<bool, SpoolError> {
        if self.lock_file.exists() {
            std::fs::remove_file(&self.lock_file)?;
            debug!(lock = %self.lock_file.display(), "stale lock removed, waiting for a competing instance");
            for _ in 0..LOCK_WAIT_TICKS {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(false),
                    _ = tokio::time::sleep(self.elapse) => {}
                }
                if self.stop_file.exists() {
                    return Ok(false);
                }
                if self.lock_file.exists() {
                    return Err(SpoolError::AlreadyRunning(self.lock_file.clone()));
                }
            }
        }
        self.refresh_lock()?;
        Ok(true)
    }

    /// Recreates the lock; called every tick.
    pub fn refresh_lock(&self) -> Result<(), SpoolError> {
        if let Some(parent) = self.lock_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.lock_file, Utc::now().to_rfc3339())?;
        Ok(())
    }

    pub fn release_lock(&self) {
        if let Err(e) = std::fs::remove_file(&self.lock_file)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(lock = %self.lock_file.display(), error = %e, "cannot remove lock");
        }
    }

    // -----------------------------------------------------------------------
    // Detection
    // -----------------------------------------------------------------------

    /// Polls the directories once. Returns the files that became valid on
    /// this tick, already marked used, ordered by path.
    pub fn scan(&mut self) -> Vec<FileItem> {
        let mut found = BTreeMap::new();
        let mut unreadable = Vec::new();
        for dir in &self.directories {
            collect_files(dir, self.recursive, &mut found, &mut unreadable);
        }
        found.retain(|path: &PathBuf, (_, size): &mut (i64, u64)| {
            *size >= self.minimal_size && self.accepts(path)
        });

        let before = self.items.len();
        // Items under a path that could not be read are kept as they are.
        self.items.retain(|path, _| {
            found.contains_key(path) || unreadable.iter().any(|skipped| path.starts_with(skipped))
        });
        if self.items.len() != before {
            self.dirty = true;
        }

        let mut valid = Vec::new();
        for (path, (modified, size)) in found {
            let Some(item) = self.items.get_mut(&path) else {
                debug!(file = %path.display(), "new file");
                self.items.insert(path.clone(), FileItem::new(path, modified, size));
                self.dirty = true;
                continue;
            };

            if item.last_modified != modified || item.size != size {
                if item.used {
                    debug!(file = %path.display(), "used file changed, detecting again");
                }
                item.last_modified = modified;
                item.size = size;
                item.hash = None;
                item.used = false;
                item.time_used = None;
                self.dirty = true;
                continue;
            }
            if item.used {
                continue;
            }

            let hash = match calculate_file_checksum(&path) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "cannot hash file");
                    continue;
                }
            };
            if item.hash.as_deref() == Some(hash.as_str()) {
                item.used = true;
                valid.push(item.clone());
            } else {
                item.hash = Some(hash);
            }
            self.dirty = true;
        }
        valid
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        path.file_name()
            .map(|name| filter.is_match(&name.to_string_lossy()))
            .unwrap_or(false)
    }

    /// Records the result of dispatching `path`. A failed file goes back
    /// through detection and is dispatched again with its special id.
    pub fn finalize_valid_file(&mut self, path: &Path, success: bool, special_id: Option<i64>) {
        self.counters.record(success, Local::now().date_naive());
        if let Some(item) = self.items.get_mut(path) {
            if special_id.is_some() {
                item.special_id = special_id;
            }
            item.time_used = Some(Utc::now());
            if !success {
                item.used = false;
                item.hash = None;
            }
        }
        self.dirty = true;
        info!(
            spool = %self.name,
            file = %path.display(),
            success,
            ok = self.counters.global_ok,
            errors = self.counters.global_error,
            "file dispatched"
        );
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Writes the status file if anything changed since the last save.
    pub fn save_status(&mut self) -> Result<(), SpoolError> {
        if !self.dirty {
            return Ok(());
        }
        let state = PersistedState {
            items: self.items.values().cloned().collect(),
            counters: self.counters.clone(),
        };
        let json = serde_json::to_string_pretty(&state)?;
        if let Some(parent) = self.status_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.status_file, json)?;
        self.dirty = false;
        debug!(items = state.items.len(), path = %self.status_file.display(), "status saved");
        Ok(())
    }

    fn load_status(&mut self) {
        if !self.status_file.exists() {
            return;
        }
        let state = std::fs::read_to_string(&self.status_file)
            .map_err(SpoolError::from)
            .and_then(|data| Ok(serde_json::from_str::<PersistedState>(&data)?));
        match state {
            Ok(state) => {
                debug!(items = state.items.len(), path = %self.status_file.display(), "status reloaded");
                self.items = state
                    .items
                    .into_iter()
                    .map(|item| (item.path.clone(), item))
                    .collect();
                self.counters = state.counters;
            }
            Err(e) => {
                warn!(path = %self.status_file.display(), error = %e, "ignoring unreadable status file");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Observer summaries
    // -----------------------------------------------------------------------

    /// Summary for `observer`: the changes since its last delivered summary,
    /// or everything when it has none or a full one was forced.
    pub fn status_for(&self, observer: &str) -> MonitorStatus {
        let previous = self
            .delivered
            .get(observer)
            .filter(|_| !self.forced_full.contains(observer));

        let (full, items, removed) = match previous {
            None => (true, self.items.values().cloned().collect(), Vec::new()),
            Some(previous) => {
                let changed = self
                    .items
                    .iter()
                    .filter(|(path, item)| previous.get(*path) != Some(*item))
                    .map(|(_, item)| item.clone())
                    .collect();
                let removed = previous
                    .keys()
                    .filter(|path| !self.items.contains_key(*path))
                    .cloned()
                    .collect();
                (false, changed, removed)
            }
        };

        MonitorStatus {
            name: self.name.clone(),
            full,
            items,
            removed,
            counters: self.counters.clone(),
            generated_at: Utc::now(),
        }
    }

    /// Copy of the current items, to hand back to [`Self::mark_delivered`]
    /// once a summary built from them was accepted.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, FileItem> {
        self.items.clone()
    }

    /// `observer` accepted the summary built from `items`.
    pub fn mark_delivered(&mut self, observer: &str, items: BTreeMap<PathBuf, FileItem>) {
        self.delivered.insert(observer.to_string(), items);
        self.forced_full.remove(observer);
    }

    /// The next summary for `observer` will be full.
    pub fn force_full(&mut self, observer: &str) {
        self.forced_full.insert(observer.to_string());
    }
}

/// Adds every regular file under `dir` with its modification time and size.
/// Paths that cannot be read go to `unreadable` and the walk goes on.
fn collect_files(
    dir: &Path,
    recursive: bool,
    found: &mut BTreeMap<PathBuf, (i64, u64)>,
    unreadable: &mut Vec<PathBuf>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot scan directory");
            unreadable.push(dir.to_path_buf());
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read directory entry");
                unreadable.push(dir.to_path_buf());
                continue;
            }
        };
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            // Removed while scanning.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot read metadata");
                unreadable.push(path);
                continue;
            }
        };

        if metadata.is_dir() {
            if recursive {
                collect_files(&path, recursive, found, unreadable);
            }
        } else if metadata.is_file() {
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default();
            found.insert(path, (modified, metadata.len()));
        }
    }
}
