//! # 直接取得

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;

use super::PayloadFetcher;

/// Relayを経由せずreqwestで直接取得するフェッチャー。
pub struct DirectFetcher {
    http_client: reqwest::Client,
    upgrade_to_https: bool,
}

impl DirectFetcher {
    /// 新しいDirectFetcherを作成する。
    ///
    /// # 引数
    /// - `upgrade_to_https`: `http:` のURLを `https:` に書き換えるか
    pub fn new(upgrade_to_https: bool) -> Result<Self, String> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("HTTPクライアントの構築に失敗: {e}"))?;
        Ok(Self {
            http_client,
            upgrade_to_https,
        })
    }
}

impl PayloadFetcher for DirectFetcher {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, String>> + Send + 'a>> {
        Box::pin(async move {
            let url = flashport_relay::handler::prepare_url(url, self.upgrade_to_https)
                .map_err(|e| e.to_string())?;
            let resp = self
                .http_client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| format!("SWF取得に失敗 ({url}): {e}"))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(format!(
                    "SWF取得でHTTPエラー: ステータス {} ({url})",
                    status.as_u16()
                ));
            }
            resp.bytes()
                .await
                .map_err(|e| format!("SWFボディの読み取りに失敗 ({url}): {e}"))
        })
    }
}
