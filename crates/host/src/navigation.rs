//! # Navigation Capture
//!
//! トップレベルの「ナビゲーション開始」イベントを受け取り、
//! 直近のナビゲーションを単一スロット `lastNavigation` に記録する。
//! オリジン・フレーム・スキームによるフィルタリングは行わない。

use std::sync::Arc;

use tokio::sync::mpsc;

use flashport_types::{NavigationEvent, NavigationRecord, LAST_NAVIGATION_KEY};

use crate::error::StorageError;
use crate::storage::KeyValueStore;

/// ナビゲーションイベントのリスナー。
#[derive(Clone)]
pub struct NavigationCapture {
    store: Arc<dyn KeyValueStore>,
}

impl NavigationCapture {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// イベントを記録する。既存のレコードは無条件に上書きされる。
    pub async fn record(&self, event: &NavigationEvent) -> Result<(), StorageError> {
        let value = serde_json::to_value(event)?;
        self.store.set(LAST_NAVIGATION_KEY, value).await?;
        tracing::debug!(url = %event.url, frame_id = ?event.frame_id, "ナビゲーションを記録");
        Ok(())
    }

    /// 記録済みのナビゲーションを削除せずに参照する。
    pub async fn peek(&self) -> Result<Option<NavigationRecord>, StorageError> {
        match self.store.get(LAST_NAVIGATION_KEY).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// 記録済みのナビゲーションを破棄する。
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(LAST_NAVIGATION_KEY).await?;
        tracing::debug!("記録済みナビゲーションを破棄");
        Ok(())
    }

    /// イベントチャネルを購読し、閉じられるまで記録し続ける。
    pub async fn run(self, mut events: mpsc::Receiver<NavigationEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.record(&event).await {
                tracing::error!(url = %event.url, "ナビゲーションの記録に失敗: {}", e);
            }
        }
        tracing::info!("ナビゲーションイベントのチャネルが閉じられました");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn event(url: &str, frame_id: i64) -> NavigationEvent {
        NavigationEvent {
            url: url.to_string(),
            frame_id: Some(frame_id),
            parent_frame_id: Some(-1),
            tab_id: Some(1),
            time_stamp: Some(1_700_000_000_000.0),
        }
    }

    /// N件のイベント後、レコードはN件目の内容だけを保持する
    #[tokio::test]
    async fn test_last_event_wins() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let capture = NavigationCapture::new(store.clone());

        for i in 0..5 {
            capture
                .record(&event(&format!("https://example.com/{i}.swf"), i))
                .await
                .unwrap();
        }

        let stored: NavigationEvent =
            serde_json::from_value(store.get(LAST_NAVIGATION_KEY).await.unwrap().unwrap())
                .unwrap();
        assert_eq!(stored, event("https://example.com/4.swf", 4));
    }

    /// 自身のページや非httpスキームも区別なく記録される
    #[tokio::test]
    async fn test_no_filtering() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let capture = NavigationCapture::new(store.clone());

        capture
            .record(&event("chrome-extension://abc/player.html", 3))
            .await
            .unwrap();

        let stored = store.get(LAST_NAVIGATION_KEY).await.unwrap().unwrap();
        assert_eq!(stored["url"], "chrome-extension://abc/player.html");
        assert_eq!(stored["frameId"], 3);
    }

    #[tokio::test]
    async fn test_run_consumes_channel() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(8);
        let listener = tokio::spawn(NavigationCapture::new(store.clone()).run(rx));

        tx.send(event("https://example.com/a.swf", 0)).await.unwrap();
        tx.send(event("https://example.com/b.swf", 0)).await.unwrap();
        drop(tx);
        listener.await.unwrap();

        let stored = store.get(LAST_NAVIGATION_KEY).await.unwrap().unwrap();
        assert_eq!(stored["url"], "https://example.com/b.swf");
    }

    #[tokio::test]
    async fn test_peek_keeps_record_and_clear_removes_it() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let capture = NavigationCapture::new(store.clone());
        assert_eq!(capture.peek().await.unwrap(), None);

        capture.record(&event("https://example.com/a.swf", 0)).await.unwrap();
        let first = capture.peek().await.unwrap();
        assert_eq!(first, Some(event("https://example.com/a.swf", 0)));
        assert_eq!(capture.peek().await.unwrap(), first);

        capture.clear().await.unwrap();
        assert_eq!(capture.peek().await.unwrap(), None);
        // 空の状態での破棄もエラーにならない
        capture.clear().await.unwrap();
    }
}
