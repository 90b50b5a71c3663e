//! # Relay設定
//!
//! 環境変数からの設定読み込み。

use std::str::FromStr;
use std::time::Duration;

/// デフォルトのリッスンアドレス
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:8000";

/// 同時に処理するセッション数の上限
pub const DEFAULT_MAX_SESSIONS: usize = 32;

/// 1セッションで中継する最大ボディサイズ（256MB）
pub const DEFAULT_MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// 上流から次のチャンクが届くまでの最大待機時間（秒）
pub const DEFAULT_CHUNK_TIMEOUT_SEC: u64 = 30;

/// 接続後、リクエストフレームが届くまでの最大待機時間（秒）
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 10;

/// Fetch Relayの設定。
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// リッスンアドレス
    pub addr: String,
    /// 同時セッション数の上限（超過した接続はパーミット待ちになる）
    pub max_sessions: usize,
    /// 中継するボディの最大サイズ
    pub max_body_bytes: u64,
    /// チャンク単位の読み取りタイムアウト
    pub chunk_timeout: Duration,
    /// リクエストフレームの読み取りタイムアウト
    pub request_timeout: Duration,
    /// `http:` を `https:` に書き換えるか。
    ///
    /// Relayは依頼元ページのスキームを知らないため、デフォルトでは書き換えない。
    /// https配信のページからのみ利用される構成で有効にする。
    pub upgrade_to_https: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_RELAY_ADDR.to_string(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            chunk_timeout: Duration::from_secs(DEFAULT_CHUNK_TIMEOUT_SEC),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SEC),
            upgrade_to_https: false,
        }
    }
}

impl RelayConfig {
    /// 環境変数から構築する。未設定・パース不能な値はデフォルトにフォールバックする。
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addr: std::env::var("RELAY_ADDR").unwrap_or(defaults.addr),
            max_sessions: env_or("RELAY_MAX_SESSIONS", defaults.max_sessions).max(1),
            max_body_bytes: env_or("RELAY_MAX_BODY_BYTES", defaults.max_body_bytes),
            chunk_timeout: Duration::from_secs(env_or(
                "RELAY_CHUNK_TIMEOUT_SEC",
                DEFAULT_CHUNK_TIMEOUT_SEC,
            )),
            request_timeout: Duration::from_secs(env_or(
                "RELAY_REQUEST_TIMEOUT_SEC",
                DEFAULT_REQUEST_TIMEOUT_SEC,
            )),
            upgrade_to_https: env_or("RELAY_UPGRADE_TO_HTTPS", defaults.upgrade_to_https),
        }
    }
}

/// 環境変数を読み取り `T` にパースする。失敗時は警告を出してデフォルト値を返す。
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key).unwrap_or(default)
}

/// 環境変数を読み取り `T` にパースする。未設定ならNone。
/// パースできない値は警告を出した上で未設定として扱う。
pub fn env_opt<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "環境変数をパースできません。未設定として扱います");
            None
        }
    }
}
