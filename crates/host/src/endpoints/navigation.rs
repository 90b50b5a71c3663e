//! # /navigation
//!
//! ブラウザ側から転送されるトップレベルの「ナビゲーション開始」イベントの受け口と、
//! 記録済みナビゲーションの参照・破棄。

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use flashport_types::NavigationEvent;

use crate::config::HostState;
use crate::error::HostError;

/// POST /navigation: イベントをNavigation Captureへ渡す。
///
/// 記録は非同期に行われるため、受理した時点で202を返す。
pub async fn handle_navigation(
    State(state): State<Arc<HostState>>,
    Json(event): Json<NavigationEvent>,
) -> Result<StatusCode, HostError> {
    if event.url.is_empty() {
        return Err(HostError::BadRequest("urlが空です".to_string()));
    }

    state
        .navigation_tx
        .send(event)
        .await
        .map_err(|_| HostError::Internal("ナビゲーションリスナーが停止しています".to_string()))?;

    Ok(StatusCode::ACCEPTED)
}

/// GET /navigation: 記録済みナビゲーションを返す。なければ204。
///
/// Player Bootstrapとは異なり、レコードは消費しない。
pub async fn handle_last_navigation(
    State(state): State<Arc<HostState>>,
) -> Result<Response, HostError> {
    match state.navigation.peek().await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// DELETE /navigation: 記録済みナビゲーションを破棄する。
pub async fn handle_clear_navigation(
    State(state): State<Arc<HostState>>,
) -> Result<StatusCode, HostError> {
    state.navigation.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}
