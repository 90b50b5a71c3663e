//! # Host設定・共有状態
//!
//! 環境変数からの設定読み込みとHostの共有状態の定義。

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::mpsc;

use flashport_relay::config::{env_opt, env_or, DEFAULT_RELAY_ADDR};
use flashport_types::{NavigationEvent, PlayerConfig};

use crate::bootstrap::{FailurePolicy, FetchPolicy, PlayerBootstrap};
use crate::navigation::NavigationCapture;

/// デフォルトのリッスンアドレス
pub const DEFAULT_HOST_ADDR: &str = "127.0.0.1:4000";

/// ペイロードの取得経路。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Hostが直接HTTP取得する
    Direct,
    /// 指定アドレスのFetch Relayを経由する
    Relay { addr: String },
}

/// Host設定。
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// リッスンアドレス
    pub addr: String,
    /// プレイヤーページの公開URL（ページURLの組み立てに使用）
    pub public_url: Url,
    /// 永続ストアのパス（Noneならインメモリ）
    pub store_path: Option<PathBuf>,
    /// ペイロードの取得経路
    pub fetch_mode: FetchMode,
    /// 取得ポリシー
    pub fetch_policy: FetchPolicy,
    /// フレームへ渡すプレイヤー設定
    pub player: PlayerConfig,
}

impl HostConfig {
    /// 環境変数から構築する。
    ///
    /// - `HOST_ADDR`, `PUBLIC_URL`, `STORE_PATH`
    /// - `FETCH_MODE` (`direct` | `relay`), `RELAY_ADDR`
    /// - `FETCH_FAILURE_POLICY` (`abandon` | `retry`), `FETCH_MAX_ATTEMPTS`,
    ///   `FETCH_BACKOFF_MS`, `FETCH_TIMEOUT_SEC`
    /// - `UPGRADE_TO_HTTPS`
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("HOST_ADDR").unwrap_or_else(|_| DEFAULT_HOST_ADDR.to_string());
        let public_url = std::env::var("PUBLIC_URL").unwrap_or_else(|_| format!("http://{addr}/"));
        let public_url = Url::parse(&public_url)
            .map_err(|e| anyhow::anyhow!("PUBLIC_URLが不正です ({public_url}): {e}"))?;

        let store_path = std::env::var("STORE_PATH").ok().map(PathBuf::from);

        let fetch_mode = match std::env::var("FETCH_MODE").as_deref() {
            Ok("relay") => FetchMode::Relay {
                addr: std::env::var("RELAY_ADDR").unwrap_or_else(|_| DEFAULT_RELAY_ADDR.to_string()),
            },
            Ok("direct") | Err(_) => FetchMode::Direct,
            Ok(other) => anyhow::bail!("未知のFETCH_MODE: {other}"),
        };

        let on_failure = match std::env::var("FETCH_FAILURE_POLICY").as_deref() {
            Ok("retry") => FailurePolicy::Retry {
                max_attempts: env_or("FETCH_MAX_ATTEMPTS", 3u32),
                backoff: Duration::from_millis(env_or("FETCH_BACKOFF_MS", 500u64)),
            },
            Ok("abandon") | Err(_) => FailurePolicy::Abandon,
            Ok(other) => anyhow::bail!("未知のFETCH_FAILURE_POLICY: {other}"),
        };
        let timeout = env_opt::<u64>("FETCH_TIMEOUT_SEC").map(Duration::from_secs);

        let player = PlayerConfig {
            upgrade_to_https: env_or("UPGRADE_TO_HTTPS", true),
            ..PlayerConfig::default()
        };

        Ok(Self {
            addr,
            public_url,
            store_path,
            fetch_mode,
            fetch_policy: FetchPolicy {
                on_failure,
                timeout,
            },
            player,
        })
    }

    /// 直接取得で `http:` を `https:` に書き換えるか。
    ///
    /// プレイヤー設定で有効、かつページ自身がhttpsで配信されている場合のみ書き換える。
    pub fn upgrade_fetches_to_https(&self) -> bool {
        self.player.upgrade_to_https && self.public_url.scheme() == "https"
    }
}

/// Hostの共有状態。
pub struct HostState {
    /// プレイヤーページの公開URL
    pub public_url: Url,
    /// Player Bootstrap
    pub bootstrap: PlayerBootstrap,
    /// Navigation Captureのリスナーへイベントを渡すチャネル
    pub navigation_tx: mpsc::Sender<NavigationEvent>,
    /// 記録済みナビゲーションの参照・破棄用
    pub navigation: NavigationCapture,
}
