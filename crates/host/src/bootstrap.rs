//! # Player Bootstrap
//!
//! ページ読み込み時に一度だけ評価される状態機械。
//!
//! ## 状態遷移
//! - State A: ページ自身の `url` クエリパラメータがある → そのURLを読み込む
//! - State B: パラメータがない → `lastNavigation` を取り出して削除する
//!   - なし: 何もしない
//!   - あり: `?url=<記録されたURL>` を付けたページへリダイレクトし、State Aへ再入する
//!
//! URLが確定したらバイト列を取得し、サンドボックスフレームの読み込み完了を
//! 待ってからペイロードを1回だけ転送する。

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;

use flashport_types::{NavigationRecord, PlayerConfig, PlayerPayload, LAST_NAVIGATION_KEY, PAGE_URL_PARAM};

use crate::error::BootstrapError;
use crate::fetcher::PayloadFetcher;
use crate::sandbox::{self, PlayerFactory};
use crate::storage::KeyValueStore;

/// 取得失敗時の振る舞い。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 1回だけ試行し、失敗したらフレームには何も渡さない
    Abandon,
    /// `max_attempts` 回まで試行する。待機時間は試行ごとに `backoff` ずつ伸びる
    Retry { max_attempts: u32, backoff: Duration },
}

/// ペイロード取得ポリシー。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    pub on_failure: FailurePolicy,
    /// 1回の試行あたりのタイムアウト（Noneなら無制限）
    pub timeout: Option<Duration>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::Abandon,
            timeout: None,
        }
    }
}

impl FetchPolicy {
    fn max_attempts(&self) -> u32 {
        match &self.on_failure {
            FailurePolicy::Abandon => 1,
            FailurePolicy::Retry { max_attempts, .. } => (*max_attempts).max(1),
        }
    }
}

/// `resolve` の結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// このURLのリソースを読み込む
    Load(Url),
    /// ページをこのURLに書き換えて再読み込みする
    Redirect(Url),
    /// 読み込むものがない
    Idle,
}

/// フレームへの転送結果。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub frame_id: String,
    pub source_url: String,
    pub bytes: usize,
    pub fetcher: &'static str,
    pub attempts: u32,
    pub config: PlayerConfig,
}

/// ページ読み込み1回分の結果。
#[derive(Debug)]
pub enum PageResult {
    Delivered(DeliveryReport),
    Redirect(Url),
    Idle,
}

/// Player Bootstrap本体。
pub struct PlayerBootstrap {
    store: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn PayloadFetcher>,
    player_factory: PlayerFactory,
    config: PlayerConfig,
    policy: FetchPolicy,
}

impl PlayerBootstrap {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn PayloadFetcher>,
        player_factory: PlayerFactory,
        config: PlayerConfig,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            player_factory,
            config,
            policy,
        }
    }

    /// ページURLから読み込み対象を決定する。
    pub async fn resolve(&self, page_url: &Url) -> Result<BootstrapOutcome, BootstrapError> {
        let explicit = page_url
            .query_pairs()
            .find(|(k, v)| k == PAGE_URL_PARAM && !v.is_empty())
            .map(|(_, v)| v.into_owned());

        // State A: ストレージには触れない
        if let Some(raw) = explicit {
            let url = page_url
                .join(&raw)
                .map_err(|e| BootstrapError::InvalidUrl(format!("{raw}: {e}")))?;
            return Ok(BootstrapOutcome::Load(url));
        }

        // State B: 取得と削除は1操作
        let Some(value) = self.store.take(LAST_NAVIGATION_KEY).await? else {
            return Ok(BootstrapOutcome::Idle);
        };

        let record: NavigationRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("lastNavigationを解釈できないため破棄しました: {}", e);
                return Ok(BootstrapOutcome::Idle);
            }
        };

        let mut redirect = page_url.clone();
        redirect.set_fragment(None);
        redirect
            .query_pairs_mut()
            .clear()
            .append_pair(PAGE_URL_PARAM, &record.url);
        tracing::info!(captured = %record.url, "記録済みナビゲーションへリダイレクト");
        Ok(BootstrapOutcome::Redirect(redirect))
    }

    /// リソースを取得し、新しいサンドボックスフレームへ転送する。
    pub async fn load(&self, url: &Url) -> Result<DeliveryReport, BootstrapError> {
        let frame = sandbox::open_frame(self.player_factory.clone());
        let frame_id = frame.id();

        // 失敗時はここでフレームが破棄され、フレームは何も読み込まずに終わる
        let (movie, attempts) = self.fetch_with_policy(url.as_str()).await?;

        let ready = frame.loaded().await?;
        let bytes = movie.len();
        ready.post(PlayerPayload {
            movie,
            config: self.config.clone(),
            source_url: url.to_string(),
        })?;

        tracing::info!(frame = %frame_id, %url, bytes, attempts, "ペイロードをフレームへ転送");
        Ok(DeliveryReport {
            frame_id: frame_id.to_string(),
            source_url: url.to_string(),
            bytes,
            fetcher: self.fetcher.name(),
            attempts,
            config: self.config.clone(),
        })
    }

    /// ページ読み込みを1回処理する（resolve → load）。
    pub async fn handle_page(&self, page_url: &Url) -> Result<PageResult, BootstrapError> {
        match self.resolve(page_url).await? {
            BootstrapOutcome::Load(url) => Ok(PageResult::Delivered(self.load(&url).await?)),
            BootstrapOutcome::Redirect(url) => Ok(PageResult::Redirect(url)),
            BootstrapOutcome::Idle => Ok(PageResult::Idle),
        }
    }

    async fn fetch_with_policy(&self, url: &str) -> Result<(bytes::Bytes, u32), BootstrapError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.policy.timeout {
                Some(limit) => tokio::time::timeout(limit, self.fetcher.fetch(url))
                    .await
                    .unwrap_or_else(|_| Err(format!("{}秒でタイムアウトしました", limit.as_secs_f64()))),
                None => self.fetcher.fetch(url).await,
            };

            match result {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(reason) if attempt < max_attempts => {
                    tracing::warn!(url, attempt, max_attempts, "取得に失敗、リトライします: {}", reason);
                    if let FailurePolicy::Retry { backoff, .. } = &self.policy.on_failure {
                        tokio::time::sleep(*backoff * attempt).await;
                    }
                }
                Err(reason) => {
                    tracing::error!(url, attempt, "取得に失敗: {}", reason);
                    return Err(BootstrapError::Fetch {
                        url: url.to_string(),
                        attempts: attempt,
                        reason,
                    });
                }
            }
        }
    }
}
