//! # Fetch Relay経由の取得

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use flashport_relay::RelayClient;

use super::PayloadFetcher;

/// Fetch Relayに取得を依頼するフェッチャー。
///
/// httpsへの書き換えやサイズ上限はRelay側の設定に従う。
pub struct RelayFetcher {
    client: RelayClient,
}

impl RelayFetcher {
    /// 新しいRelayFetcherを作成する。
    ///
    /// # 引数
    /// - `relay_addr`: Relayのアドレス（例: "127.0.0.1:8000"）
    pub fn new(relay_addr: impl Into<String>) -> Self {
        Self {
            client: RelayClient::new(relay_addr),
        }
    }
}

impl PayloadFetcher for RelayFetcher {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, String>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .fetch_with_progress(url, |p| {
                    tracing::trace!(loaded = p.loaded, chunks = p.chunks, "Relayからチャンク受信");
                })
                .await
                .map_err(|e| format!("Relay経由の取得に失敗 ({url}, relay={}): {e}", self.client.addr()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{start_mock_swf_server, start_test_relay};

    #[tokio::test]
    async fn test_fetch_via_relay() {
        let movie: Vec<u8> = b"CWS\x0a"
            .iter()
            .copied()
            .chain((0..70_000u32).map(|i| (i % 199) as u8))
            .collect();
        let upstream = start_mock_swf_server("/foo.swf", movie.clone()).await;
        let relay = start_test_relay().await;

        let fetcher = RelayFetcher::new(format!("127.0.0.1:{relay}"));
        let bytes = fetcher
            .fetch(&format!("http://127.0.0.1:{upstream}/foo.swf"))
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), movie.as_slice());
    }

    #[tokio::test]
    async fn test_relay_error_surfaces() {
        let upstream = start_mock_swf_server("/foo.swf", b"FWS".to_vec()).await;
        let relay = start_test_relay().await;

        let fetcher = RelayFetcher::new(format!("127.0.0.1:{relay}"));
        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{upstream}/missing.swf"))
            .await
            .unwrap_err();
        assert!(err.contains("404"), "{err}");
    }
}
