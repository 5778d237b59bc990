//! The caller-facing response channel.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;

use crate::relay::message::ResponseHead;

/// Where a relay operation writes its response.
///
/// `send_head` is called at most once and always before `write`. A head
/// with `has_entity == false` is followed directly by `finish`.
#[async_trait]
pub trait ResponseSink: Send {
    async fn send_head(&mut self, head: ResponseHead) -> io::Result<()>;

    async fn write(&mut self, chunk: Bytes) -> io::Result<()>;

    async fn finish(&mut self) -> io::Result<()>;

    /// Whether a head has been sent; after that errors can no longer be
    /// turned into a status code.
    fn is_committed(&self) -> bool;
}
