//! # Flashport Host
//!
//! ブラウザ拡張のバックグラウンド側とプレイヤーページ側を1プロセスで担うHost。
//!
//! ## 役割
//! - Navigation Capture: トップレベルのナビゲーションを `lastNavigation` に記録
//! - Player Bootstrap: ページ読み込み時に読み込み対象を決定し、SWFを取得
//! - サンドボックスフレーム: 取得したペイロードを1回だけ受け取りプレイヤーへ渡す
//!
//! ## API エンドポイント
//! - `POST /navigation`: ナビゲーション開始イベントの受け口
//! - `GET /navigation`: 記録済みナビゲーションの参照（消費しない）
//! - `DELETE /navigation`: 記録済みナビゲーションの破棄
//! - `GET /player`: プレイヤーページの読み込み

mod bootstrap;
mod config;
mod endpoints;
mod error;
mod fetcher;
mod navigation;
mod sandbox;
mod storage;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bootstrap::PlayerBootstrap;
use crate::config::{FetchMode, HostConfig, HostState};
use crate::endpoints::{
    handle_clear_navigation, handle_last_navigation, handle_navigation, handle_player,
};
use crate::fetcher::{DirectFetcher, PayloadFetcher, RelayFetcher};
use crate::navigation::NavigationCapture;
use crate::sandbox::{InspectingPlayer, Player, PlayerFactory};
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore};

/// ナビゲーションイベントチャネルの容量
const NAVIGATION_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = HostConfig::from_env()?;

    // ストレージの選択
    let store: Arc<dyn KeyValueStore> = match &config.store_path {
        Some(path) => {
            let store = JsonFileStore::open(path).await?;
            tracing::info!(path = %store.path().display(), "JSONファイルストアを使用します");
            Arc::new(store)
        }
        None => {
            tracing::info!("インメモリストアを使用します（再起動で記録は失われます）");
            Arc::new(MemoryStore::new())
        }
    };

    // 取得経路の選択
    let fetcher: Arc<dyn PayloadFetcher> = match &config.fetch_mode {
        FetchMode::Direct => Arc::new(
            DirectFetcher::new(config.upgrade_fetches_to_https()).map_err(|e| anyhow::anyhow!(e))?,
        ),
        FetchMode::Relay { addr } => {
            tracing::info!(relay = %addr, "Fetch Relay経由で取得します");
            Arc::new(RelayFetcher::new(addr.clone()))
        }
    };

    // Navigation Captureリスナー
    let (navigation_tx, navigation_rx) = mpsc::channel(NAVIGATION_CHANNEL_CAPACITY);
    let navigation = NavigationCapture::new(store.clone());
    tokio::spawn(navigation.clone().run(navigation_rx));

    let player_factory: PlayerFactory =
        Arc::new(|| Box::new(InspectingPlayer) as Box<dyn Player>);

    let state = Arc::new(HostState {
        public_url: config.public_url.clone(),
        bootstrap: PlayerBootstrap::new(
            store,
            fetcher,
            player_factory,
            config.player.clone(),
            config.fetch_policy.clone(),
        ),
        navigation_tx,
        navigation,
    });

    let app = axum::Router::new()
        .route(
            "/navigation",
            axum::routing::post(handle_navigation)
                .get(handle_last_navigation)
                .delete(handle_clear_navigation),
        )
        .route("/player", axum::routing::get(handle_player))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!(
        addr = %config.addr,
        public_url = %config.public_url,
        fetch_mode = ?config.fetch_mode,
        policy = ?config.fetch_policy,
        "Flashport Host起動"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
