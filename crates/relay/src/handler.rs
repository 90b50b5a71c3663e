//! # Fetch転送ハンドラ
//!
//! クライアントから受け取った `fetch` リクエストを上流にHTTP GETで転送し、
//! レスポンスボディをチャンク単位でフレームとして返送する。
//!
//! ## セッションの流れ
//! 1. リクエストフレームを1つ読む（認識できない・時間内に届かない場合は何も書かずに切断）
//! 2. 上流へGET、Content-Lengthを上限と照合
//! 3. チャンクを受信するたびに進捗を更新し、そのままChunkフレームで返送
//! 4. Complete または Error フレームを1つ書いて切断

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;

use flashport_types::{ChannelRequest, Progress, RelayFrame};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol;

/// 上流への接続確立タイムアウト
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Relayの共有状態。
pub struct RelayContext {
    /// 設定
    pub config: RelayConfig,
    /// 上流取得用HTTPクライアント
    pub http_client: reqwest::Client,
    /// 同時セッション数を制限するセマフォ
    pub sessions: Arc<Semaphore>,
}

impl RelayContext {
    /// 設定からRelayContextを構築する。
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        // ボディ全体のタイムアウトは設けず、停滞はチャンク単位で検出する
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Upstream(format!("HTTPクライアントの構築に失敗: {e}")))?;
        let sessions = Arc::new(Semaphore::new(config.max_sessions));
        Ok(Self {
            config,
            http_client,
            sessions,
        })
    }
}

/// 取得対象URLを検証し、必要に応じて `https:` に書き換える。
///
/// http(s)以外のスキームは拒否する。
pub fn prepare_url(raw: &str, upgrade_to_https: bool) -> Result<Url, RelayError> {
    let mut url =
        Url::parse(raw).map_err(|e| RelayError::BadRequest(format!("URLが不正です ({raw}): {e}")))?;
    match url.scheme() {
        "https" => {}
        "http" => {
            if upgrade_to_https && url.set_scheme("https").is_err() {
                tracing::error!("Url::set_scheme に失敗: {}", url);
            }
        }
        other => {
            return Err(RelayError::BadRequest(format!(
                "未サポートのスキーム: {other}"
            )));
        }
    }
    Ok(url)
}

/// 上流からボディをストリーミング取得し、チャンクごとに `out` へ書き出す。
///
/// 正常終了時は最終的な進捗を返す。終端フレームの書き込みは呼び出し側が行う。
pub async fn stream_fetch<W: AsyncWrite + Unpin>(
    ctx: &RelayContext,
    raw_url: &str,
    out: &mut W,
) -> Result<Progress, RelayError> {
    let url = prepare_url(raw_url, ctx.config.upgrade_to_https)?;
    let limit = ctx.config.max_body_bytes;
    let chunk_timeout = ctx.config.chunk_timeout;

    let mut resp = ctx
        .http_client
        .get(url)
        .send()
        .await
        .map_err(|e| RelayError::Upstream(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RelayError::Upstream(format!("HTTP {}", status.as_u16())));
    }

    // 宣言サイズが上限を超えていれば1バイトも流さずに拒否
    let total = resp.content_length();
    if let Some(size) = total {
        if size > limit {
            return Err(RelayError::PayloadTooLarge { size, limit });
        }
    }

    let mut progress = Progress::new(total);
    loop {
        let next = tokio::time::timeout(chunk_timeout, resp.chunk())
            .await
            .map_err(|_| RelayError::ChunkReadTimeout {
                timeout_sec: chunk_timeout.as_secs(),
            })?
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let Some(chunk) = next else {
            break;
        };
        if chunk.is_empty() {
            continue;
        }

        progress.advance(chunk.len());
        if progress.loaded > limit {
            return Err(RelayError::PayloadTooLarge {
                size: progress.loaded,
                limit,
            });
        }

        tracing::debug!(
            loaded = progress.loaded,
            total = ?progress.total,
            chunks = progress.chunks,
            fraction = ?progress.fraction(),
            "チャンク転送"
        );

        protocol::write_frame(out, &RelayFrame::Chunk(chunk)).await?;
    }

    Ok(progress)
}

/// 1接続分のセッションを処理する。
///
/// TCPでもインメモリのduplexでも同じように動く。
pub async fn handle_connection<S>(mut stream: S, ctx: Arc<RelayContext>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let session = uuid::Uuid::new_v4();

    let request_timeout = ctx.config.request_timeout;
    let request = match tokio::time::timeout(request_timeout, protocol::read_request(&mut stream))
        .await
    {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => {
            tracing::warn!(%session, "認識できないリクエスト。接続を閉じます: {}", e);
            let _ = stream.shutdown().await;
            return;
        }
        Err(_) => {
            tracing::warn!(
                %session,
                timeout_sec = request_timeout.as_secs_f64(),
                "リクエストが届かないため接続を閉じます"
            );
            let _ = stream.shutdown().await;
            return;
        }
    };

    match request {
        ChannelRequest::Fetch { url } => {
            tracing::info!(%session, %url, "fetch開始");

            let terminal = match stream_fetch(&ctx, &url, &mut stream).await {
                Ok(progress) => {
                    tracing::info!(
                        %session,
                        loaded = progress.loaded,
                        chunks = progress.chunks,
                        "fetch完了"
                    );
                    RelayFrame::Complete
                }
                Err(e) => {
                    tracing::error!(%session, %url, "fetch失敗: {}", e);
                    RelayFrame::Error(e.to_string())
                }
            };

            if let Err(e) = protocol::write_frame(&mut stream, &terminal).await {
                tracing::error!(%session, "終端フレーム書き込みエラー: {}", e);
            }
        }
    }

    let _ = stream.shutdown().await;
}
