//! # JSONファイル キーバリューストア
//!
//! 全エントリを1つのJSONオブジェクトとしてファイルに保存する。
//! 書き込みは一時ファイルへ書いてからrenameで置き換える。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::KeyValueStore;
use crate::error::StorageError;

/// JSONファイルに永続化するストア。
///
/// プロセス内ではMutexで直列化し、ファイルは変更のたびに書き直す。
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl JsonFileStore {
    /// ファイルを開く。存在しなければ空のストアとして開始する。
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(raw) if raw.is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(path = %path.display(), entries = entries.len(), "ストアを開きました");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// ファイルパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, serde_json::Value>) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let mut entries = self.entries.lock().await;
        let value = entries.remove(key);
        if value.is_some() {
            self.persist(&entries).await?;
        }
        Ok(value)
    }
}
