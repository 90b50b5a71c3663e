//! # Relayクライアント
//!
//! 低権限側からRelayに `fetch` を依頼し、チャンクを到着順に連結する。
//! 終端フレームで成否を判定し、終端なしの切断は `Truncated` として扱う。

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

use flashport_types::{ChannelRequest, Progress, RelayFrame};

use crate::error::RelayError;
use crate::protocol;

/// TCP経由でRelayに接続するクライアント。
#[derive(Debug, Clone)]
pub struct RelayClient {
    addr: String,
}

impl RelayClient {
    /// 新しいRelayClientを作成する。
    ///
    /// # 引数
    /// - `addr`: Relayのアドレス（例: "127.0.0.1:8000"）
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// 接続先アドレス
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `url` を取得し、ボディ全体を返す。
    pub async fn fetch(&self, url: &str) -> Result<Bytes, RelayError> {
        self.fetch_with_progress(url, |_| {}).await
    }

    /// `url` を取得し、チャンク受信ごとに `on_progress` を呼び出す。
    pub async fn fetch_with_progress<F>(&self, url: &str, on_progress: F) -> Result<Bytes, RelayError>
    where
        F: FnMut(&Progress),
    {
        let stream = tokio::net::TcpStream::connect(&self.addr).await?;
        fetch_over(stream, url, on_progress).await
    }
}

/// 任意の双方向ストリーム上でfetchセッションを1回実行する。
pub async fn fetch_over<S, F>(mut stream: S, url: &str, mut on_progress: F) -> Result<Bytes, RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&Progress),
{
    let request = ChannelRequest::Fetch {
        url: url.to_string(),
    };
    protocol::write_request(&mut stream, &request).await?;

    let mut body = BytesMut::new();
    // クライアント側では宣言サイズは分からない
    let mut progress = Progress::new(None);

    loop {
        match protocol::read_frame(&mut stream).await? {
            Some(RelayFrame::Chunk(chunk)) => {
                progress.advance(chunk.len());
                body.extend_from_slice(&chunk);
                on_progress(&progress);
            }
            Some(RelayFrame::Complete) => return Ok(body.freeze()),
            Some(RelayFrame::Error(reason)) => return Err(RelayError::Remote(reason)),
            None => {
                return Err(RelayError::Truncated {
                    received: progress.loaded,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chunkを1つ送って終端なしで切断するRelayは Truncated になる
    #[tokio::test]
    async fn test_disconnect_without_terminal_is_truncated() {
        let (client, mut server) = tokio::io::duplex(4096);

        tokio::spawn(async move {
            let _ = protocol::read_request(&mut server).await.unwrap();
            protocol::write_frame(&mut server, &RelayFrame::Chunk(Bytes::from_static(b"CWS\x0a")))
                .await
                .unwrap();
        });

        let err = fetch_over(client, "https://example.com/a.swf", |_| {})
            .await
            .unwrap_err();
        assert!(
            matches!(err, RelayError::Truncated { received: 4 }),
            "Truncatedエラーが期待される: {err:?}"
        );
    }

    /// Relayが受け取るのは `{"type":"fetch","url":...}` 形式
    #[tokio::test]
    async fn test_request_shape() {
        let (client, mut server) = tokio::io::duplex(4096);

        let relay = tokio::spawn(async move {
            let req = protocol::read_request(&mut server).await.unwrap();
            protocol::write_frame(&mut server, &RelayFrame::Complete)
                .await
                .unwrap();
            req
        });

        let body = fetch_over(client, "https://example.com/a.swf", |_| {})
            .await
            .unwrap();
        assert!(body.is_empty());
        assert_eq!(
            relay.await.unwrap(),
            ChannelRequest::Fetch {
                url: "https://example.com/a.swf".into()
            }
        );
    }
}
