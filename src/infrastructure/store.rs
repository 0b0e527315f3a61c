//! 键值存储 - 基础设施层
//!
//! 协调器把规范教程状态、进度与设置写入这里。记录不存在时返回 `None`，
//! 调用方按默认值处理。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::StorageError;

/// 设置记录的固定 key
pub const SETTINGS_KEY: &str = "extensionSettings";

/// 站点教程状态的 key
pub fn state_key(site_id: &str) -> String {
    format!("tutorialState_{}", site_id)
}

/// 站点进度记录的 key
pub fn progress_key(site_id: &str) -> String {
    format!("progress_{}", site_id)
}

/// 异步键值存储
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, StorageError>;

    async fn set(&self, key: &str, value: JsonValue) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// 读取并反序列化一条记录
pub async fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// 序列化并写入一条记录
pub async fn save<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// 进程内存储（无持久化）
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, JsonValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的全部 key
    pub fn keys(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, StorageError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: JsonValue) -> Result<(), StorageError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// 单个 JSON 文件存储
///
/// 打开时整体读入，每次写入后整体落盘。
pub struct JsonFileStore {
    path: PathBuf,
    records: tokio::sync::Mutex<BTreeMap<String, JsonValue>>,
}

impl JsonFileStore {
    /// 打开存储文件；文件不存在视为空存储，内容损坏时记录警告并从空开始
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    warn!("⚠️ 存储文件 {} 无法解析，将从空状态开始: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        debug!("打开存储文件 {}，共 {} 条记录", path.display(), records.len());
        Ok(Self {
            path,
            records: tokio::sync::Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, records: &BTreeMap<String, JsonValue>) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| StorageError::Io {
                path: self.path.display().to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, StorageError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: JsonValue) -> Result<(), StorageError> {
        let mut records = self.records.lock().await;
        records.insert(key.to_string(), value);
        self.flush(&records).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut records = self.records.lock().await;
        if records.remove(key).is_some() {
            self.flush(&records).await?;
        }
        Ok(())
    }
}
