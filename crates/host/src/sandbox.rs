//! # サンドボックスフレーム
//!
//! プレイヤーを構築し、Player Bootstrapからペイロードを1回だけ受け取る
//! 隔離されたフレーム。フレームは独立したタスクとして動作する。
//!
//! ## 順序保証
//! `FrameHandle::loaded()` が返す `ReadyFrame` からしか `post` できないため、
//! ペイロードの送信は必ずフレームの読み込み完了後になる。
//! `post` は `self` を消費するので、送信は高々1回。

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use uuid::Uuid;

use flashport_types::PlayerPayload;

use crate::error::BootstrapError;

// ─────────────────────────────────────────────
// SWFヘッダ
// ─────────────────────────────────────────────

/// SWFの圧縮形式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// `FWS`
    None,
    /// `CWS`
    Zlib,
    /// `ZWS`
    Lzma,
}

/// SWFファイル先頭8バイトのヘッダ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwfHeader {
    pub compression: Compression,
    pub version: u8,
    /// 展開後のファイル長（リトルエンディアン）
    pub uncompressed_length: u32,
}

impl SwfHeader {
    /// ヘッダを読み取る。シグネチャが一致しなければNone。
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        let compression = match &data[0..3] {
            b"FWS" => Compression::None,
            b"CWS" => Compression::Zlib,
            b"ZWS" => Compression::Lzma,
            _ => return None,
        };
        let uncompressed_length = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        Some(Self {
            compression,
            version: data[3],
            uncompressed_length,
        })
    }
}

// ─────────────────────────────────────────────
// プレイヤー
// ─────────────────────────────────────────────

/// サンドボックス内で動作するプレイヤー。
pub trait Player: Send {
    /// ペイロードを受け取り、ムービーの読み込みを開始する。
    fn load_movie(&mut self, payload: PlayerPayload);
}

/// フレームごとにプレイヤーを構築するファクトリ。
pub type PlayerFactory = Arc<dyn Fn() -> Box<dyn Player> + Send + Sync>;

/// ヘッダとダイジェストを検査してログに出すだけのプレイヤー。
#[derive(Debug, Default)]
pub struct InspectingPlayer;

impl Player for InspectingPlayer {
    fn load_movie(&mut self, payload: PlayerPayload) {
        let digest = hex::encode(Sha256::digest(&payload.movie));
        match SwfHeader::parse(&payload.movie) {
            Some(header) => tracing::info!(
                source = %payload.source_url,
                bytes = payload.movie.len(),
                sha256 = %digest,
                version = header.version,
                compression = ?header.compression,
                uncompressed_length = header.uncompressed_length,
                letterbox = ?payload.config.letterbox,
                "ムービーを読み込みました"
            ),
            None => tracing::warn!(
                source = %payload.source_url,
                bytes = payload.movie.len(),
                sha256 = %digest,
                "SWFヘッダが見つかりません"
            ),
        }
    }
}

// ─────────────────────────────────────────────
// フレーム
// ─────────────────────────────────────────────

/// 読み込み完了前のフレームへのハンドル。
pub struct FrameHandle {
    id: Uuid,
    loaded: oneshot::Receiver<()>,
    port: oneshot::Sender<PlayerPayload>,
}

/// 読み込み完了済みのフレーム。ペイロードを1回だけ送信できる。
pub struct ReadyFrame {
    port: oneshot::Sender<PlayerPayload>,
}

/// サンドボックスフレームを開く。
///
/// フレームはプレイヤーを構築した後に読み込み完了を通知し、
/// ペイロードを待つ。ポートが破棄された場合は何もせずに終了する。
pub fn open_frame(factory: PlayerFactory) -> FrameHandle {
    let id = Uuid::new_v4();
    let (loaded_tx, loaded_rx) = oneshot::channel();
    let (port_tx, port_rx) = oneshot::channel::<PlayerPayload>();

    tokio::spawn(async move {
        let mut player = factory();
        if loaded_tx.send(()).is_err() {
            tracing::debug!(frame = %id, "読み込み通知の受信側がありません");
            return;
        }
        match port_rx.await {
            Ok(payload) => {
                tracing::debug!(frame = %id, bytes = payload.movie.len(), "ペイロード受信");
                player.load_movie(payload);
            }
            Err(_) => tracing::debug!(frame = %id, "ペイロードを受け取らずにフレームを閉じます"),
        }
    });

    FrameHandle {
        id,
        loaded: loaded_rx,
        port: port_tx,
    }
}

impl FrameHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// フレームの読み込み完了（一度きりの "load" イベント）を待つ。
    pub async fn loaded(self) -> Result<ReadyFrame, BootstrapError> {
        self.loaded.await.map_err(|_| BootstrapError::FrameClosed)?;
        Ok(ReadyFrame { port: self.port })
    }
}

impl ReadyFrame {
    /// ペイロードをフレームへ転送する。所有権はフレーム側へ移る。
    pub fn post(self, payload: PlayerPayload) -> Result<(), BootstrapError> {
        self.port
            .send(payload)
            .map_err(|_| BootstrapError::FrameClosed)
    }
}
