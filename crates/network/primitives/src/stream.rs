use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;

use borsh::{BorshDeserialize, BorshSerialize};
use bytes::Bytes;
use futures_util::{Sink as FuturesSink, SinkExt, Stream as FuturesStream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::codec::Framed;
use waku_primitives::PeerId;

mod codec;

use codec::FrameCodec;
pub use codec::CodecError;

pub const MAX_MESSAGE_SIZE: usize = 1_024 * 1_024;

/// Byte transport a substrate hands out for a single protocol stream.
pub trait StreamIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> StreamIo for T {}

/// A framed, protocol-scoped stream to one peer.
pub struct Stream {
    inner: Framed<Box<dyn StreamIo>, FrameCodec>,
}

impl Stream {
    #[must_use]
    pub fn new<T: StreamIo + 'static>(io: T) -> Self {
        Self {
            inner: Framed::new(Box::new(io), FrameCodec::new(MAX_MESSAGE_SIZE)),
        }
    }
}

impl core::fmt::Debug for Stream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl FuturesStream for Stream {
    type Item = Result<Bytes, CodecError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl FuturesSink<Bytes> for Stream {
    type Error = CodecError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_unpin(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        self.inner.start_send_unpin(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_flush_unpin(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_close_unpin(cx)
    }
}

/// Writes one borsh-encoded frame and flushes.
pub async fn send<T: BorshSerialize>(stream: &mut Stream, message: &T) -> Result<(), CodecError> {
    let encoded = borsh::to_vec(message).map_err(CodecError::Borsh)?;

    stream.send(Bytes::from(encoded)).await
}

/// Reads one borsh-encoded frame. `Ok(None)` means the peer closed the
/// stream.
pub async fn recv<T: BorshDeserialize>(
    stream: &mut Stream,
    timeout: Duration,
) -> Result<Option<T>, CodecError> {
    let Ok(frame) = time::timeout(timeout, stream.next()).await else {
        return Err(CodecError::Timeout);
    };

    let Some(frame) = frame.transpose()? else {
        return Ok(None);
    };

    borsh::from_slice(&frame).map(Some).map_err(CodecError::Borsh)
}

/// Inbound streams for one protocol, tagged with the remote peer.
#[derive(Debug)]
pub struct IncomingStreams {
    inner: mpsc::Receiver<(PeerId, Stream)>,
}

impl IncomingStreams {
    #[must_use]
    pub const fn new(inner: mpsc::Receiver<(PeerId, Stream)>) -> Self {
        Self { inner }
    }
}

impl FuturesStream for IncomingStreams {
    type Item = (PeerId, Stream);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_recv(cx)
    }
}
