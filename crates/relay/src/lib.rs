//! # Flashport Fetch Relay
//!
//! 特権側で動作し、低権限側の代わりに外部リソースを取得するRelay。
//! レスポンスボディを一括で保持せず、チャンク単位でクライアントへ流す。
//!
//! ## モジュール構成
//! - `protocol`: length-prefixedフレームの読み書き
//! - `handler`: 1接続分のfetchセッション
//! - `client`: Relayクライアント（Player Bootstrapから利用）
//! - `config`: 環境変数からの設定
//! - `error`: エラー型

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::RelayClient;
pub use config::RelayConfig;
pub use error::RelayError;
pub use handler::{handle_connection, RelayContext};

use std::sync::Arc;

/// TCPリスナーで接続を受け付け、セッションごとにタスクを起動する。
///
/// 同時セッション数は `RelayContext::sessions` のパーミット数で制限される。
/// パーミットは接続ごとのタスク内で取得するため、上限に達していても
/// 受け付けループ自体は止まらない。
pub async fn serve(listener: tokio::net::TcpListener, ctx: Arc<RelayContext>) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        tracing::info!("接続受付: {}", addr);

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let permit = match ctx.sessions.clone().acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!("セッションのパーミット取得に失敗: {}", e);
                    return;
                }
            };
            handle_connection(stream, ctx).await;
            drop(permit);
        });
    }
}
