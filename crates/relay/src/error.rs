//! # Relay エラー型

/// Fetch Relay / Relayクライアント共通のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// IO エラー（接続断・書き込み失敗）
    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    /// 認識できないリクエスト（未知のtype、JSONパース失敗）
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// フレーム形式の違反
    #[error("フレームが不正です: {0}")]
    Protocol(String),

    /// 上流へのHTTP取得に失敗（非2xxステータスを含む）
    #[error("上流HTTP取得に失敗: {0}")]
    Upstream(String),

    /// ペイロードサイズが上限を超えている
    #[error("ペイロードサイズが上限を超えています: {size} bytes (上限: {limit} bytes)")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// 上流からの次チャンクが時間内に届かなかった
    #[error("チャンク読み取りがタイムアウトしました（{timeout_sec}秒）")]
    ChunkReadTimeout { timeout_sec: u64 },

    /// RelayがErrorフレームを返した
    #[error("Relayがエラーを返しました: {0}")]
    Remote(String),

    /// 終端フレームを受け取る前に切断された
    #[error("終端フレームを受信する前に切断されました（{received} bytes 受信済み）")]
    Truncated { received: u64 },
}
