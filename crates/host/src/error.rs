//! # Host エラー型
//!
//! 全エンドポイントで共通のエラー型。

use axum::http::StatusCode;

/// 永続ストレージのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// ファイルIO失敗
    #[error("ストレージIOエラー: {0}")]
    Io(#[from] std::io::Error),
    /// JSONのシリアライズ・デシリアライズ失敗
    #[error("ストレージのJSON処理に失敗: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Player Bootstrapのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// ストレージ操作に失敗
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// リソースURLが解釈できない
    #[error("URLが不正です: {0}")]
    InvalidUrl(String),
    /// リソースの取得に失敗（ポリシーに従ったリトライ後）
    #[error("リソース取得に失敗 ({url}, {attempts}回試行): {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },
    /// サンドボックスフレームがペイロードを受け取る前に終了した
    #[error("サンドボックスフレームが閉じられています")]
    FrameClosed,
}

/// Hostエラー型。
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Bootstrap処理のエラー
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// ストレージ操作に失敗
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for HostError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            HostError::Bootstrap(BootstrapError::Fetch { .. }) => StatusCode::BAD_GATEWAY,
            HostError::Bootstrap(BootstrapError::InvalidUrl(_)) | HostError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            HostError::Bootstrap(BootstrapError::Storage(_))
            | HostError::Bootstrap(BootstrapError::FrameClosed)
            | HostError::Storage(_)
            | HostError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
