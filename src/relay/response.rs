//! Response relay: status, filtered headers, streamed body.
//!
//! # Design Decisions
//! - The body is copied chunk by chunk; backpressure comes from the sink
//! - A response without an entity never produces a write call
//! - Once the head is out, every failure is `RelayInterrupted`

use futures_util::StreamExt;
use std::time::Duration;

use crate::relay::error::{RelayError, RelayResult};
use crate::relay::headers;
use crate::relay::message::{ProxyResponse, ResponseHead};
use crate::relay::sink::ResponseSink;

pub struct ResponseRelay {
    idle_timeout: Duration,
}

impl ResponseRelay {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }

    /// Relay `response` into `sink`, returning the number of body bytes.
    pub async fn relay<S>(&self, response: ProxyResponse, sink: &mut S) -> RelayResult<u64>
    where
        S: ResponseSink + ?Sized,
    {
        let head = ResponseHead {
            status: response.status,
            headers: headers::end_to_end(&response.headers),
            has_entity: response.body.is_some(),
        };
        sink.send_head(head).await.map_err(|e| interrupted(0, e))?;

        let Some(body) = response.body else {
            sink.finish().await.map_err(|e| interrupted(0, e))?;
            return Ok(0);
        };

        let mut stream = body.into_data_stream();
        let mut bytes = 0u64;
        loop {
            let next = match tokio::time::timeout(self.idle_timeout, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    return Err(RelayError::RelayInterrupted {
                        bytes,
                        reason: format!("upstream idle for {:?}", self.idle_timeout),
                    })
                }
            };
            match next {
                None => break,
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    let len = chunk.len() as u64;
                    sink.write(chunk).await.map_err(|e| interrupted(bytes, e))?;
                    bytes += len;
                }
                Some(Err(e)) => {
                    return Err(RelayError::RelayInterrupted {
                        bytes,
                        reason: format!("upstream read failed: {}", e),
                    })
                }
            }
        }

        sink.finish().await.map_err(|e| interrupted(bytes, e))?;
        Ok(bytes)
    }
}

fn interrupted(bytes: u64, e: std::io::Error) -> RelayError {
    RelayError::RelayInterrupted {
        bytes,
        reason: format!("caller write failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, HeaderValue, StatusCode};
    use bytes::Bytes;
    use std::io;

    #[derive(Default)]
    struct VecSink {
        head: Option<ResponseHead>,
        writes: Vec<Bytes>,
        finished: bool,
        fail_writes: bool,
    }

    #[async_trait]
    impl ResponseSink for VecSink {
        async fn send_head(&mut self, head: ResponseHead) -> io::Result<()> {
            self.head = Some(head);
            Ok(())
        }

        async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            self.writes.push(chunk);
            Ok(())
        }

        async fn finish(&mut self) -> io::Result<()> {
            self.finished = true;
            Ok(())
        }

        fn is_committed(&self) -> bool {
            self.head.is_some()
        }
    }

    fn relay() -> ResponseRelay {
        ResponseRelay::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_no_entity_means_no_write() {
        let mut sink = VecSink::default();
        let bytes = relay().relay(ProxyResponse::new(StatusCode::OK), &mut sink).await.unwrap();

        assert_eq!(bytes, 0);
        assert!(sink.finished);
        assert!(sink.writes.is_empty());
        let head = sink.head.unwrap();
        assert_eq!(head.status, StatusCode::OK);
        assert!(!head.has_entity);
    }

    #[tokio::test]
    async fn test_headers_filtered_and_body_streamed() {
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"<response>")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"Some content</response>")),
        ];
        let response = ProxyResponse::new(StatusCode::OK)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/xml"))
            .with_header(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"))
            .with_header(header::CONTENT_LENGTH, HeaderValue::from_static("33"))
            .with_body(Body::from_stream(futures_util::stream::iter(chunks)));

        let mut sink = VecSink::default();
        let bytes = relay().relay(response, &mut sink).await.unwrap();

        assert_eq!(bytes, 33);
        assert_eq!(sink.writes.len(), 2);
        let head = sink.head.unwrap();
        assert_eq!(head.headers.get(header::CONTENT_TYPE).unwrap(), "text/xml");
        assert!(head.headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(head.headers.get(header::CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_interrupts() {
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let response = ProxyResponse::new(StatusCode::OK)
            .with_body(Body::from_stream(futures_util::stream::iter(chunks)));

        let mut sink = VecSink::default();
        let err = relay().relay(response, &mut sink).await.unwrap_err();
        assert!(matches!(err, RelayError::RelayInterrupted { bytes: 7, .. }));
        assert!(!sink.finished);
    }

    #[tokio::test]
    async fn test_caller_disconnect_interrupts() {
        let response = ProxyResponse::new(StatusCode::OK).with_body("payload");
        let mut sink = VecSink {
            fail_writes: true,
            ..Default::default()
        };
        let err = relay().relay(response, &mut sink).await.unwrap_err();
        assert!(matches!(err, RelayError::RelayInterrupted { bytes: 0, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_upstream_interrupts() {
        let stalled = futures_util::stream::pending::<Result<Bytes, io::Error>>();
        let response = ProxyResponse::new(StatusCode::OK).with_body(Body::from_stream(stalled));

        let mut sink = VecSink::default();
        let err = ResponseRelay::new(Duration::from_secs(1))
            .relay(response, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::RelayInterrupted { bytes: 0, .. }));
        assert!(sink.head.is_some());
    }
}
