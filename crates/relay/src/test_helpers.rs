//! # Relayテスト用共通ヘルパー

use std::sync::Arc;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::handler::RelayContext;

/// テスト用のRelayContext。ローカルのモックサーバーに向けるためhttpsへの書き換えは無効。
pub fn test_context() -> RelayContext {
    RelayContext::new(RelayConfig {
        addr: "127.0.0.1:0".to_string(),
        max_sessions: 8,
        max_body_bytes: 16 * 1024 * 1024,
        chunk_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
        upgrade_to_https: false,
    })
    .unwrap()
}

/// テスト用モック上流サーバーを起動し、`/movie.swf` で指定データを返す。
pub async fn start_mock_upstream(data: Vec<u8>) -> u16 {
    use axum::routing::get;

    let app = axum::Router::new().route(
        "/movie.swf",
        get(move || {
            let d = data.clone();
            async move { d }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// Content-Lengthを付けず、chunked encodingでボディを返すモック上流を起動する。
///
/// 各チャンクの送信前に `delay` だけ待つ。どのパスへのGETにも同じ応答を返す。
pub async fn start_chunked_upstream(chunks: Vec<Vec<u8>>, delay: Duration) -> u16 {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let chunks = chunks.clone();
            tokio::spawn(async move {
                // リクエストヘッダの終端まで読み捨てる
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }

                let header = "HTTP/1.1 200 OK\r\n\
                              Content-Type: application/x-shockwave-flash\r\n\
                              Transfer-Encoding: chunked\r\n\
                              Connection: close\r\n\r\n";
                if stream.write_all(header.as_bytes()).await.is_err() {
                    return;
                }
                for chunk in chunks {
                    tokio::time::sleep(delay).await;
                    let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                    frame.extend_from_slice(&chunk);
                    frame.extend_from_slice(b"\r\n");
                    if stream.write_all(&frame).await.is_err() {
                        return;
                    }
                    let _ = stream.flush().await;
                }
                let _ = stream.write_all(b"0\r\n\r\n").await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

/// テスト用Relayを起動し、ポート番号を返す。
pub async fn start_relay(ctx: RelayContext) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let ctx = Arc::new(ctx);
    tokio::spawn(async move {
        let _ = crate::serve(listener, ctx).await;
    });
    port
}
