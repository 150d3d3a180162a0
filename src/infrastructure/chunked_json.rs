// Chunked JSON streaming for the OR View mirror
use crate::domain::sync_message::SyncMessage;
use async_compression::tokio::bufread::BrotliEncoder;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

pub const CONTENT_TYPE: &str = "application/x-tah-sync";

/// Each chunk is a 4-byte big-endian length followed by one `{type, data}`
/// envelope, brotli-compressed on its own when `compress` is set.
pub async fn chunked_json_stream<S>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = SyncMessage> + Send + 'static,
{
    let byte_stream = stream.then(move |msg| async move { serialize_chunk(&msg, compress).await });

    // no Content-Encoding: chunks are compressed individually, not the body
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn serialize_chunk(msg: &SyncMessage, compress: bool) -> Result<Bytes, std::io::Error> {
    let buffer = serde_json::to_vec(msg)?;

    let payload = if compress {
        let mut encoder = BrotliEncoder::new(std::io::Cursor::new(buffer));
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await?;
        compressed
    } else {
        buffer
    };

    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(payload.len() as u32);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// The stream ends when every sender for `rx` is dropped.
pub async fn stream_from_receiver(mut rx: mpsc::Receiver<SyncMessage>, compress: bool) -> impl IntoResponse {
    let stream = async_stream::stream! {
        while let Some(msg) = rx.recv().await {
            yield msg;
        }
    };

    match chunked_json_stream(stream, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::BrotliDecoder;

    fn split(chunk: &[u8]) -> (usize, &[u8]) {
        let len = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
        (len, &chunk[4..])
    }

    #[tokio::test]
    async fn test_plain_chunk_is_length_prefixed_json() {
        let chunk = serialize_chunk(&SyncMessage::UpdateStopwatch(7), false).await.unwrap();
        let (len, payload) = split(&chunk);
        assert_eq!(len, payload.len());

        let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "UPDATE_STOPWATCH", "data": 7 }));
    }

    #[tokio::test]
    async fn test_compressed_chunk_decodes_to_same_message() {
        let msg = SyncMessage::UpdateStopwatch(3600);
        let chunk = serialize_chunk(&msg, true).await.unwrap();
        let (len, payload) = split(&chunk);
        assert_eq!(len, payload.len());

        let mut decoder = BrotliDecoder::new(std::io::Cursor::new(payload.to_vec()));
        let mut plain = Vec::new();
        decoder.read_to_end(&mut plain).await.unwrap();
        let decoded: SyncMessage = serde_json::from_slice(&plain).unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(SyncMessage::UpdateStopwatch(1)).await.unwrap();
        drop(tx);

        let response = stream_from_receiver(rx, false).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let (len, payload) = split(&body);
        assert_eq!(len, payload.len());
    }
}
