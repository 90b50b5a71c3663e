//! # Hostテスト用共通ヘルパー
//!
//! モックSWFサーバー、テスト用Relay、記録用プレイヤー、固定応答フェッチャー。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use reqwest::Url;
use flashport_types::{NavigationEvent, PlayerConfig, PlayerPayload};

use crate::bootstrap::{FetchPolicy, PlayerBootstrap};
use crate::config::HostState;
use crate::fetcher::PayloadFetcher;
use crate::navigation::NavigationCapture;
use crate::sandbox::{Player, PlayerFactory};
use crate::storage::KeyValueStore;

/// テスト用モックHTTPサーバーを起動し、指定パスで指定データを返す。
pub async fn start_mock_swf_server(path: &str, data: Vec<u8>) -> u16 {
    use axum::routing::get;

    let app = axum::Router::new().route(
        path,
        get(move || {
            let d = data.clone();
            async move { d }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// デフォルト設定のテスト用Fetch Relayを起動する。
pub async fn start_test_relay() -> u16 {
    let config = flashport_relay::RelayConfig {
        addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let ctx = Arc::new(flashport_relay::RelayContext::new(config).unwrap());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = flashport_relay::serve(listener, ctx).await;
    });
    port
}

/// 呼び出しをイベント文字列としてチャネルに流すプレイヤー。
pub struct RecordingPlayer {
    events: mpsc::UnboundedSender<String>,
}

impl RecordingPlayer {
    /// ファクトリとイベント受信側を返す。
    ///
    /// 構築時に `"constructed"`、読み込み時に `"load_movie:<bytes>"` を送る。
    pub fn factory() -> (PlayerFactory, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory: PlayerFactory = Arc::new(move || {
            let _ = tx.send("constructed".to_string());
            Box::new(RecordingPlayer { events: tx.clone() }) as Box<dyn Player>
        });
        (factory, rx)
    }
}

impl Player for RecordingPlayer {
    fn load_movie(&mut self, payload: PlayerPayload) {
        let _ = self
            .events
            .send(format!("load_movie:{}", payload.movie.len()));
    }
}

/// 固定のバイト列を返すフェッチャー。
pub struct StaticFetcher {
    data: Option<Bytes>,
}

impl StaticFetcher {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: Some(Bytes::copy_from_slice(data)),
        }
    }

    /// 永遠に完了しないフェッチャー。
    pub fn hanging() -> Self {
        Self { data: None }
    }
}

impl PayloadFetcher for StaticFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    fn fetch<'a>(
        &'a self,
        _url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, String>> + Send + 'a>> {
        Box::pin(async move {
            match &self.data {
                Some(d) => Ok(d.clone()),
                None => std::future::pending().await,
            }
        })
    }
}

/// 最初の `failures` 回は失敗し、その後は成功するフェッチャー。
pub struct FlakyFetcher {
    failures: u32,
    calls: AtomicU32,
    data: Bytes,
}

impl FlakyFetcher {
    pub fn new(failures: u32, data: &[u8]) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            data: Bytes::copy_from_slice(data),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PayloadFetcher for FlakyFetcher {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn fetch<'a>(
        &'a self,
        _url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, String>> + Send + 'a>> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(format!("接続失敗 (試行{n})"))
            } else {
                Ok(self.data.clone())
            }
        })
    }
}

/// エンドポイントテスト用のHost状態を組み立てる。
///
/// ナビゲーションイベントの受信側と、プレイヤーのイベント受信側も返す。
pub fn test_state(
    store: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn PayloadFetcher>,
    public_url: &str,
) -> (
    Arc<HostState>,
    mpsc::Receiver<NavigationEvent>,
    mpsc::UnboundedReceiver<String>,
) {
    let (factory, events) = RecordingPlayer::factory();
    let (navigation_tx, navigation_rx) = mpsc::channel(8);
    let navigation = NavigationCapture::new(store.clone());
    let bootstrap = PlayerBootstrap::new(
        store,
        fetcher,
        factory,
        PlayerConfig::default(),
        FetchPolicy::default(),
    );
    let state = Arc::new(HostState {
        public_url: Url::parse(public_url).unwrap(),
        bootstrap,
        navigation_tx,
        navigation,
    });
    (state, navigation_rx, events)
}
