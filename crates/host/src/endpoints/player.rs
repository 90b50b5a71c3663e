//! # GET /player
//!
//! プレイヤーページの読み込み。ページURL（クエリ込み）をPlayer Bootstrapに渡し、
//! 結果をHTTPレスポンスに対応付ける。
//!
//! - 転送完了: 200 + `DeliveryReport`
//! - 記録済みナビゲーションあり: 303 + `Location: ?url=...`
//! - 読み込むものなし: 204

use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::bootstrap::PageResult;
use crate::config::HostState;
use crate::error::HostError;

/// GET /player: ページ読み込み1回分を処理する。
pub async fn handle_player(
    State(state): State<Arc<HostState>>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, HostError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let page_url = state
        .public_url
        .join(path_and_query)
        .map_err(|e| HostError::BadRequest(format!("ページURLを組み立てられません: {e}")))?;

    let response = match state.bootstrap.handle_page(&page_url).await? {
        PageResult::Delivered(report) => (StatusCode::OK, Json(report)).into_response(),
        PageResult::Redirect(location) => (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, location.to_string())],
        )
            .into_response(),
        PageResult::Idle => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}
