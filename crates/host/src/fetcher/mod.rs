//! # ペイロード取得
//!
//! Player BootstrapがSWFバイナリを取得する方法を抽象化する。
//!
//! ## 取得方法
//! - `DirectFetcher`: reqwestで直接取得する
//! - `RelayFetcher`: Fetch Relay経由でチャンク単位に取得する

pub mod direct;
pub mod relay;

pub use direct::DirectFetcher;
pub use relay::RelayFetcher;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

/// SWFバイナリを取得するトレイト。
pub trait PayloadFetcher: Send + Sync {
    /// 取得方法の名前（ログ用）
    fn name(&self) -> &'static str;

    /// `url` のリソースを取得する。
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, String>> + Send + 'a>>;
}
