//! # 永続キーバリューストア
//!
//! Navigation CaptureとPlayer Bootstrapの両方に注入される共有ストレージの
//! 抽象インターフェース。
//!
//! ## 実装
//! - `MemoryStore`: プロセス内のみ（テスト・開発用）
//! - `JsonFileStore`: JSONファイルに永続化

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;

/// 共有キーバリューストアのトレイト。
///
/// `take` は取得と削除を1つの操作として行い、
/// 読み出しから削除までの間に書き込みが割り込むことはない。
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 値を取得する。存在しなければNone。
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// 値を上書き保存する。
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;

    /// 値を削除する。存在しなくてもエラーにはしない。
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// 値を取得して同時に削除する。
    async fn take(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;
}
