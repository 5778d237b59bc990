//! Channel-backed response sink bridging a relay task to an axum response.
//!
//! # Data Flow
//! ```text
//! relay task ── head (oneshot) ──→ handler builds Response
//!            ── chunks (bounded mpsc) ──→ response body stream → hyper
//! ```
//!
//! # Design Decisions
//! - The bounded body channel is the relay's only buffer; a slow caller
//!   slows the upstream read
//! - A dropped response body (caller gone) makes the next write fail, which
//!   ends the relay and drops the upstream stream
//! - Aborting pushes an error into the body so hyper resets the connection
//!   instead of ending the response cleanly

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::io;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::relay::{RelayError, ResponseHead, ResponseSink};

type Chunk = Result<Bytes, io::Error>;

pub struct ChannelSink {
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: Option<mpsc::Sender<Chunk>>,
    committed: bool,
}

/// Handler side of a [`ChannelSink`].
pub struct PendingResponse {
    head_rx: oneshot::Receiver<ResponseHead>,
    body_rx: mpsc::Receiver<Chunk>,
}

impl ChannelSink {
    pub fn channel(capacity: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                head_tx: Some(head_tx),
                body_tx: Some(body_tx),
                committed: false,
            },
            PendingResponse { head_rx, body_rx },
        )
    }

    /// Answer with the error's status. Only valid before a head was sent.
    pub async fn reject(&mut self, error: &RelayError) {
        let status = error.status_code().unwrap_or(StatusCode::BAD_GATEWAY);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        let head = ResponseHead {
            status,
            headers,
            has_entity: true,
        };
        if self.send_head(head).await.is_ok() {
            let _ = self.write(Bytes::from(error.to_string())).await;
        }
        self.body_tx = None;
    }

    /// Cut the response short after the head was committed.
    pub async fn abort(&mut self, reason: String) {
        if let Some(tx) = self.body_tx.take() {
            let _ = tx.send(Err(io::Error::new(io::ErrorKind::Interrupted, reason))).await;
        }
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn send_head(&mut self, head: ResponseHead) -> io::Result<()> {
        let tx = self
            .head_tx
            .take()
            .ok_or_else(|| io::Error::other("response head already sent"))?;
        self.committed = true;
        if !head.has_entity {
            self.body_tx = None;
        }
        tx.send(head)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "caller went away"))
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        let tx = self
            .body_tx
            .as_ref()
            .ok_or_else(|| io::Error::other("response body already closed"))?;
        tx.send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "caller disconnected"))
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.body_tx = None;
        Ok(())
    }

    fn is_committed(&self) -> bool {
        self.committed
    }
}

impl PendingResponse {
    /// Wait for the head and turn it into a streaming axum response.
    pub async fn into_response(self) -> Response {
        let head = match self.head_rx.await {
            Ok(head) => head,
            Err(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Relay ended without a response").into_response();
            }
        };

        let body = if head.has_entity {
            Body::from_stream(ReceiverStream::new(self.body_rx))
        } else {
            Body::empty()
        };

        let mut response = Response::new(body);
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }
}
