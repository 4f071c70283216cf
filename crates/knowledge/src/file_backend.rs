//! File-based knowledge store: persistent JSON-lines storage.
//!
//! Layout under the store directory:
//!
//! ```text
//! <dir>/<container>.jsonl   one KnowledgeEntry per line, rewritten on change
//! <dir>/_rollup.jsonl       one RollupEntry per line, append-only
//! ```
//!
//! Everything is loaded on creation. A container's file is rewritten while
//! the write lock is held, so concurrent calls never interleave on disk.

use crate::rollup_entry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loglens_core::analysis::AnalysisResult;
use loglens_core::error::KnowledgeError;
use loglens_core::knowledge::{KnowledgeBackend, KnowledgeEntry, RollupEntry};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const ROLLUP_FILE: &str = "_rollup.jsonl";

pub struct FileKnowledge {
    dir: PathBuf,
    entries: Arc<RwLock<HashMap<String, Vec<KnowledgeEntry>>>>,
    rollup: Arc<RwLock<Vec<RollupEntry>>>,
}

impl FileKnowledge {
    /// Open the store at `dir`, loading whatever is already there.
    ///
    /// A missing directory starts empty; it is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let entries = Self::load_entries(&dir);
        let rollup: Vec<RollupEntry> = read_jsonl(&dir.join(ROLLUP_FILE));
        debug!(
            dir = %dir.display(),
            containers = entries.len(),
            rollup = rollup.len(),
            "File knowledge store loaded"
        );
        Self {
            dir,
            entries: Arc::new(RwLock::new(entries)),
            rollup: Arc::new(RwLock::new(rollup)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file holding `container`'s entries.
    pub fn container_path(&self, container: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize(container)))
    }

    fn load_entries(dir: &Path) -> HashMap<String, Vec<KnowledgeEntry>> {
        let mut map: HashMap<String, Vec<KnowledgeEntry>> = HashMap::new();
        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return map;
        };
        for item in read_dir.flatten() {
            let path = item.path();
            let is_jsonl = path.extension().is_some_and(|e| e == "jsonl");
            if !is_jsonl || path.file_name().is_some_and(|n| n == ROLLUP_FILE) {
                continue;
            }
            for entry in read_jsonl::<KnowledgeEntry>(&path) {
                map.entry(entry.container_name.clone()).or_default().push(entry);
            }
        }
        for list in map.values_mut() {
            list.sort_by_key(|e| e.timestamp);
        }
        map
    }

    /// Rewrite one container's file. Removes it when no entries remain.
    fn write_container(&self, container: &str, list: &[KnowledgeEntry]) -> Result<(), KnowledgeError> {
        let path = self.container_path(container);
        if list.is_empty() {
            return match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(KnowledgeError::Storage(format!(
                    "Failed to remove {}: {e}",
                    path.display()
                ))),
            };
        }

        self.ensure_dir()?;
        let mut content = String::new();
        for entry in list {
            content.push_str(&to_line(entry)?);
        }
        std::fs::write(&path, content).map_err(|e| {
            KnowledgeError::Storage(format!("Failed to write {}: {e}", path.display()))
        })
    }

    fn append_rollup(&self, entry: &RollupEntry) -> Result<(), KnowledgeError> {
        self.ensure_dir()?;
        let path = self.dir.join(ROLLUP_FILE);
        let line = to_line(entry)?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(line.as_bytes()))
            .map_err(|e| KnowledgeError::Storage(format!("Failed to append to {}: {e}", path.display())))
    }

    fn ensure_dir(&self) -> Result<(), KnowledgeError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            KnowledgeError::Storage(format!("Failed to create knowledge directory: {e}"))
        })
    }
}

#[async_trait]
impl KnowledgeBackend for FileKnowledge {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(
        &self,
        container: &str,
        result: &AnalysisResult,
        now: DateTime<Utc>,
    ) -> Result<KnowledgeEntry, KnowledgeError> {
        let entry = KnowledgeEntry {
            timestamp: now,
            container_name: container.to_string(),
            analysis_text: result.analysis_text.clone(),
        };
        {
            let mut entries = self.entries.write().await;
            let list = entries.entry(container.to_string()).or_default();
            list.push(entry.clone());
            if let Err(e) = self.write_container(container, list) {
                list.pop();
                return Err(e);
            }
        }

        let summary = rollup_entry(container, result, now);
        let mut rollup = self.rollup.write().await;
        self.append_rollup(&summary)?;
        rollup.push(summary);
        Ok(entry)
    }

    async fn prune(
        &self,
        container: &str,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, KnowledgeError> {
        let mut entries = self.entries.write().await;
        let Some(list) = entries.get(container) else {
            return Ok(0);
        };
        let kept: Vec<KnowledgeEntry> = list
            .iter()
            .filter(|e| !e.is_expired(retention_days, now))
            .cloned()
            .collect();
        let removed = list.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        self.write_container(container, &kept)?;
        debug!(container, removed, "Pruned knowledge file");
        if kept.is_empty() {
            entries.remove(container);
        } else {
            entries.insert(container.to_string(), kept);
        }
        Ok(removed)
    }

    async fn entries(&self, container: &str) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        Ok(self
            .entries
            .read()
            .await
            .get(container)
            .cloned()
            .unwrap_or_default())
    }

    async fn containers(&self) -> Result<Vec<String>, KnowledgeError> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn rollup(&self) -> Result<Vec<RollupEntry>, KnowledgeError> {
        Ok(self.rollup.read().await.clone())
    }
}

/// File-name-safe form of a container name.
///
/// ASCII letters, digits and `-` pass through, as does `.` past the first
/// character. Every other byte becomes `_xx` (lowercase hex), so distinct
/// names never share a file and none can collide with `_rollup`.
fn sanitize(container: &str) -> String {
    if container.is_empty() {
        return "_".to_string();
    }
    let mut name = String::with_capacity(container.len());
    for (i, byte) in container.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'-' || (byte == b'.' && i > 0);
        if keep {
            name.push(byte as char);
        } else {
            name.push_str(&format!("_{byte:02x}"));
        }
    }
    name
}

fn to_line<T: serde::Serialize>(value: &T) -> Result<String, KnowledgeError> {
    let mut line =
        serde_json::to_string(value).map_err(|e| KnowledgeError::Serialization(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Load a JSONL file, skipping lines that fail to parse.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupted knowledge line");
                None
            }
        })
        .collect()
}
