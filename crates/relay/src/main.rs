//! # Flashport Fetch Relay
//!
//! 低権限のPlayer Bootstrapに代わって外部のSWFを取得し、
//! チャンク単位で返送する特権側サービス。
//!
//! ## 設定（環境変数）
//! - `RELAY_ADDR`: リッスンアドレス（デフォルト `127.0.0.1:8000`）
//! - `RELAY_MAX_SESSIONS`: 同時セッション数の上限
//! - `RELAY_MAX_BODY_BYTES`: 中継する最大ボディサイズ
//! - `RELAY_CHUNK_TIMEOUT_SEC`: チャンク読み取りタイムアウト
//! - `RELAY_REQUEST_TIMEOUT_SEC`: 接続後のリクエスト読み取りタイムアウト
//! - `RELAY_UPGRADE_TO_HTTPS`: `http:` を `https:` に書き換えるか（デフォルト無効）

use std::sync::Arc;

use flashport_relay::{RelayConfig, RelayContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = RelayConfig::from_env();
    tracing::info!(
        max_sessions = config.max_sessions,
        max_body_bytes = config.max_body_bytes,
        upgrade_to_https = config.upgrade_to_https,
        "Fetch Relayを {} で起動します",
        config.addr
    );

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    let ctx = Arc::new(RelayContext::new(config)?);
    flashport_relay::serve(listener, ctx).await?;

    Ok(())
}
