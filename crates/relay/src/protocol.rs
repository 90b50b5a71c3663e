//! # Length-prefixed フレームプロトコル
//!
//! クライアント ↔ Relay間の通信に使用するバイナリプロトコル。
//!
//! ## クライアント → Relay
//! ```text
//! [4B: json_len][ChannelRequest JSON]
//! ```
//!
//! ## Relay → クライアント
//! ```text
//! [1B: tag][4B: payload_len][payload]   (終端フレームまで繰り返し)
//! ```
//! - `0x01` Chunk: 生のレスポンスボディ断片
//! - `0x02` Complete: ペイロードなし
//! - `0x03` Error: UTF-8の理由文字列

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use flashport_types::{ChannelRequest, RelayFrame};

use crate::error::RelayError;

pub const TAG_CHUNK: u8 = 0x01;
pub const TAG_COMPLETE: u8 = 0x02;
pub const TAG_ERROR: u8 = 0x03;

/// リクエストJSONの最大サイズ（64KB）。
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// 受信側で許容する1フレームの最大ペイロード（16MB）。
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// ストリームから4バイトビッグエンディアンのu32を読み取る。
pub async fn read_u32_async<R: AsyncRead + Unpin>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

/// length-prefixedバイト列を読み取る。`limit` を超える長さは拒否する。
async fn read_bytes_limited<R: AsyncRead + Unpin>(
    r: &mut R,
    limit: usize,
) -> Result<Vec<u8>, RelayError> {
    let len = read_u32_async(r).await? as usize;
    if len > limit {
        return Err(RelayError::Protocol(format!(
            "長さ {len} bytes が上限 {limit} bytes を超えています"
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await?;
    Ok(buf)
}

/// チャネルリクエストを読み取る。
///
/// 未知の `type` や不正なJSONは `BadRequest` になる。
pub async fn read_request<R: AsyncRead + Unpin>(r: &mut R) -> Result<ChannelRequest, RelayError> {
    let raw = read_bytes_limited(r, MAX_REQUEST_BYTES).await?;
    serde_json::from_slice(&raw).map_err(|e| RelayError::BadRequest(e.to_string()))
}

/// チャネルリクエストを書き込む。
pub async fn write_request<W: AsyncWrite + Unpin>(
    w: &mut W,
    request: &ChannelRequest,
) -> Result<(), RelayError> {
    let json = serde_json::to_vec(request).map_err(|e| RelayError::BadRequest(e.to_string()))?;
    w.write_all(&(json.len() as u32).to_be_bytes()).await?;
    w.write_all(&json).await?;
    w.flush().await?;
    Ok(())
}

/// フレームを1つ書き込む。
pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    frame: &RelayFrame,
) -> std::io::Result<()> {
    let (tag, payload): (u8, &[u8]) = match frame {
        RelayFrame::Chunk(bytes) => (TAG_CHUNK, bytes.as_ref()),
        RelayFrame::Complete => (TAG_COMPLETE, &[]),
        RelayFrame::Error(reason) => (TAG_ERROR, reason.as_bytes()),
    };
    w.write_u8(tag).await?;
    w.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    w.write_all(payload).await?;
    w.flush().await
}

/// フレームを1つ読み取る。
///
/// フレーム境界で接続が閉じられた場合は `Ok(None)` を返す。
/// フレームの途中で切れた場合はIOエラー。
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<RelayFrame>, RelayError> {
    let tag = match r.read_u8().await {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let payload = read_bytes_limited(r, MAX_FRAME_BYTES).await?;
    let frame = match tag {
        TAG_CHUNK => RelayFrame::Chunk(Bytes::from(payload)),
        TAG_COMPLETE => RelayFrame::Complete,
        TAG_ERROR => RelayFrame::Error(String::from_utf8_lossy(&payload).into_owned()),
        other => {
            return Err(RelayError::Protocol(format!("未知のフレームタグ: 0x{other:02x}")));
        }
    };
    Ok(Some(frame))
}
