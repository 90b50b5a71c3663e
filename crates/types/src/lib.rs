//! # Flashport 共有型定義
//!
//! Fetch Relay・Navigation Capture・Player Bootstrapの間で受け渡される
//! データ構造をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - JSON: `ChannelRequest`、`NavigationRecord`、`PlayerConfig`
//! - バイナリ: `RelayFrame`（エンコードは `flashport-relay` のprotocolモジュール）

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// 定数
// ─────────────────────────────────────────────

/// 直近のナビゲーションを保持する永続ストレージのキー。
pub const LAST_NAVIGATION_KEY: &str = "lastNavigation";

/// プレイヤーページがリソースURLを受け取るクエリパラメータ名。
pub const PAGE_URL_PARAM: &str = "url";

// ─────────────────────────────────────────────
// Fetch Relay リクエスト / フレーム
// ─────────────────────────────────────────────

/// Relayへのチャネルリクエスト。
///
/// `{"type": "fetch", "url": "..."}` 形式。`type` が未知の値の場合は
/// デシリアライズに失敗し、Relayは即座に接続を閉じる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelRequest {
    /// 指定URLをHTTP GETで取得し、チャンク単位で返送する。
    Fetch {
        /// 取得対象URL
        url: String,
    },
}

/// Relay → クライアント方向のメッセージ。
///
/// 終端は必ず `Complete` か `Error` のいずれか1つで示される。
/// 切断のみで終わったセッションは途中で打ち切られたものとして扱う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// レスポンスボディの断片（到着順）
    Chunk(Bytes),
    /// 正常終了
    Complete,
    /// 異常終了（理由文字列）
    Error(String),
}

impl RelayFrame {
    /// 終端フレームかどうか。
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayFrame::Chunk(_))
    }
}

// ─────────────────────────────────────────────
// 進捗
// ─────────────────────────────────────────────

/// ストリーミング取得の進捗。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// 受信済みバイト数（累計）
    pub loaded: u64,
    /// Content-Lengthで宣言された総バイト数（不明の場合はNone）
    pub total: Option<u64>,
    /// 受信済みチャンク数
    pub chunks: u64,
}

impl Progress {
    /// 宣言サイズから進捗を開始する。
    pub fn new(total: Option<u64>) -> Self {
        Self {
            loaded: 0,
            total,
            chunks: 0,
        }
    }

    /// チャンク1つ分の受信を記録する。
    pub fn advance(&mut self, len: usize) {
        self.loaded += len as u64;
        self.chunks += 1;
    }

    /// 0.0〜1.0の進捗率。総バイト数が不明または0の場合はNone。
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.loaded as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────
// ナビゲーション
// ─────────────────────────────────────────────

/// ブラウザから通知される「ナビゲーション開始」イベント。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    /// 遷移先URL
    pub url: String,
    /// フレームID（0はトップレベル）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    /// 親フレームID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_frame_id: Option<i64>,
    /// タブID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    /// イベント発生時刻（エポックからのミリ秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<f64>,
}

/// `lastNavigation` キーに保存される単一スロットのレコード。
///
/// イベントの内容をそのまま保持する。読み出しは破壊的（取得と同時に削除）。
pub type NavigationRecord = NavigationEvent;

// ─────────────────────────────────────────────
// プレイヤー設定 / ペイロード
// ─────────────────────────────────────────────

/// レターボックス表示モード。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Letterbox {
    Off,
    #[default]
    Fullscreen,
    On,
}

/// プレイヤーのログレベル。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// 自動再生ポリシー。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Autoplay {
    On,
    Off,
    #[default]
    Auto,
}

/// ミュート解除オーバーレイの表示。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmuteOverlay {
    #[default]
    Visible,
    Hidden,
}

/// サンドボックスフレームへ渡すプレイヤー設定（静的デフォルト）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    pub letterbox: Letterbox,
    pub log_level: LogLevel,
    pub autoplay: Autoplay,
    pub unmute_overlay: UnmuteOverlay,
    /// `http:` のリソースURLを `https:` に書き換えるか
    pub upgrade_to_https: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            letterbox: Letterbox::Fullscreen,
            log_level: LogLevel::Error,
            autoplay: Autoplay::Auto,
            unmute_overlay: UnmuteOverlay::Visible,
            upgrade_to_https: true,
        }
    }
}

/// Player Bootstrapからサンドボックスフレームへ一度だけ転送されるペイロード。
///
/// 所有権ごと移動するため、送信後に送信側からバイト列へ触れることはできない。
#[derive(Debug)]
pub struct PlayerPayload {
    /// SWFバイナリ
    pub movie: Bytes,
    /// プレイヤー設定
    pub config: PlayerConfig,
    /// 取得元URL
    pub source_url: String,
}
