//! 追加写日志文件存储
//!
//! 每行一个 JSON 事件：
//! ```text
//! {"op":"store","original":"...","alias":"...","owner":"...","created_at":"..."}
//! {"op":"delete","owner":"...","aliases":["..."]}
//! ```
//! 启动时按顺序回放到 [`MemoryStorage`]，之后读请求只走内存。

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::memory::{Conflict, MemoryStorage};
use super::{Lookup, Repository, StoreOutcome, UrlRecord};
use crate::errors::{Result, ShortenerError};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogEntry {
    Store(UrlRecord),
    Delete { owner: String, aliases: Vec<String> },
}

pub struct FileStorage {
    path: PathBuf,
    // 写者互斥：检查、写文件、更新内存三步在同一把锁内完成
    writer: Mutex<File>,
    memory: MemoryStorage,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ShortenerError::file_operation(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let memory = MemoryStorage::new();
        let replayed = Self::replay(&path, &memory)?;

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                ShortenerError::file_operation(format!(
                    "Failed to open {}: {}",
                    path.display(),
                    e
                ))
            })?;

        info!(
            "FileStorage: loaded {} records from {} ({} log entries)",
            memory.len(),
            path.display(),
            replayed
        );

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            memory,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(path: &Path, memory: &MemoryStorage) -> Result<usize> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut entries = 0;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(&line).map_err(|e| {
                ShortenerError::serialization(format!(
                    "{} line {}: {}",
                    path.display(),
                    index + 1,
                    e
                ))
            })?;
            entries += 1;

            match entry {
                LogEntry::Store(record) => match memory.check(&record) {
                    None => memory.insert_unchecked(record),
                    Some(conflict) => {
                        warn!(
                            "FileStorage: skipping line {} ({:?})",
                            index + 1,
                            conflict
                        );
                    }
                },
                LogEntry::Delete { owner, aliases } => {
                    memory.mark_deleted(&aliases, &owner);
                }
            }
        }
        Ok(entries)
    }

    fn append(file: &mut File, entries: &[LogEntry]) -> Result<()> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }
        file.write_all(&buf)?;
        file.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Repository for FileStorage {
    async fn store(&self, record: UrlRecord) -> Result<StoreOutcome> {
        let mut writer = self.writer.lock();
        match self.memory.check(&record) {
            Some(Conflict::Duplicate(alias)) => Ok(StoreOutcome::AlreadyExists { alias }),
            Some(Conflict::AliasTaken(alias)) => Err(ShortenerError::alias_conflict(format!(
                "alias '{}' is already taken",
                alias
            ))),
            None => {
                // 先落盘，写失败时内存保持不变
                Self::append(&mut writer, &[LogEntry::Store(record.clone())])?;
                self.memory.insert_unchecked(record);
                Ok(StoreOutcome::Stored)
            }
        }
    }

    async fn find_by_alias(&self, alias: &str) -> Result<Lookup> {
        self.memory.find_by_alias(alias).await
    }

    async fn find_all(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        self.memory.find_all(owner).await
    }

    async fn batch_store(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut writer = self.writer.lock();
        self.memory.check_batch(&records)?;

        let entries: Vec<LogEntry> = records.iter().cloned().map(LogEntry::Store).collect();
        Self::append(&mut writer, &entries)?;
        for record in records {
            self.memory.insert_unchecked(record);
        }
        debug!("FileStorage: batch stored {} records", entries.len());
        Ok(())
    }

    async fn batch_delete(&self, aliases: Vec<String>, owner: &str) -> Result<usize> {
        if owner.is_empty() || aliases.is_empty() {
            return Ok(0);
        }
        let mut writer = self.writer.lock();
        let entry = LogEntry::Delete {
            owner: owner.to_string(),
            aliases: aliases.clone(),
        };
        Self::append(&mut writer, &[entry])?;
        Ok(self.memory.mark_deleted(&aliases, owner))
    }

    async fn ping(&self) -> Result<()> {
        // 确认文件仍可访问
        std::fs::metadata(&self.path)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.log");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage
                .store(UrlRecord::new("http://a", "aaaaa", "u1"))
                .await
                .unwrap();
            storage
                .batch_store(vec![
                    UrlRecord::new("http://b", "bbbbb", "u1"),
                    UrlRecord::new("http://c", "ccccc", ""),
                ])
                .await
                .unwrap();
            storage
                .batch_delete(vec!["bbbbb".to_string()], "u1")
                .await
                .unwrap();
        }

        let storage = FileStorage::open(&path).unwrap();
        assert!(matches!(
            storage.find_by_alias("aaaaa").await.unwrap(),
            Lookup::Found(_)
        ));
        assert!(matches!(
            storage.find_by_alias("bbbbb").await.unwrap(),
            Lookup::Deleted(_)
        ));
        assert!(matches!(
            storage.find_by_alias("ccccc").await.unwrap(),
            Lookup::Found(_)
        ));
        assert_eq!(storage.find_all("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_is_not_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.log");
        let storage = FileStorage::open(&path).unwrap();

        storage
            .store(UrlRecord::new("http://a", "aaaaa", "u1"))
            .await
            .unwrap();
        let outcome = storage
            .store(UrlRecord::new("http://a", "bbbbb", "u1"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StoreOutcome::AlreadyExists {
                alias: "aaaaa".to_string()
            }
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.log");
        let storage = FileStorage::open(&path).unwrap();
        storage
            .store(UrlRecord::new("http://a", "aaaaa", "u1"))
            .await
            .unwrap();

        let result = storage
            .batch_store(vec![
                UrlRecord::new("http://x", "xxxxx", "u1"),
                UrlRecord::new("http://y", "aaaaa", "u1"),
            ])
            .await;
        assert!(matches!(result, Err(ShortenerError::AliasConflict(_))));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_malformed_line_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.log");
        std::fs::write(&path, "{\"op\":\"store\"\nnot json\n").unwrap();

        match FileStorage::open(&path) {
            Err(ShortenerError::Serialization(msg)) => assert!(msg.contains("line 1")),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("malformed log should not load"),
        }
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("urls.log");
        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.path().exists());
    }
}
