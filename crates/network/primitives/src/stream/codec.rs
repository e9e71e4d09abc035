use std::io;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error(transparent)]
    StdIo(#[from] io::Error),
    #[error("failed to (de)serialize frame")]
    Borsh(#[source] io::Error),
    #[error("timed out waiting for a response")]
    Timeout,
}

/// Length-prefixed frames of at most `max_frame_length` bytes.
#[derive(Debug)]
pub(crate) struct FrameCodec {
    length_codec: LengthDelimitedCodec,
}

impl FrameCodec {
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            length_codec: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_length)
                .new_codec(),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = self.length_codec.decode(src)?;

        Ok(frame.map(BytesMut::freeze))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.length_codec.encode(item, dst).map_err(CodecError::StdIo)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_test::io::Builder;
    use tokio_util::codec::FramedRead;

    use super::*;

    #[test]
    fn test_frame_encoding_decoding() {
        let request = Bytes::from_static(b"Hello");
        let response = Bytes::from_static(b"World");

        let mut buffer = BytesMut::new();
        let mut codec = FrameCodec::new(1_024);
        codec.encode(request.clone(), &mut buffer).unwrap();
        codec.encode(response.clone(), &mut buffer).unwrap();

        let decoded_request = codec.decode(&mut buffer).unwrap();
        assert_eq!(decoded_request, Some(request));

        let decoded_response = codec.decode(&mut buffer).unwrap();
        assert_eq!(decoded_response, Some(response));
    }

    #[tokio::test]
    async fn test_multiple_frames_stream() {
        let request = Bytes::from_static(b"Hello");
        let response = Bytes::from_static(b"World");

        let mut buffer = BytesMut::new();
        let mut codec = FrameCodec::new(1_024);
        codec.encode(request.clone(), &mut buffer).unwrap();
        codec.encode(response.clone(), &mut buffer).unwrap();

        let mut stream = Builder::new().read(&buffer.freeze()).build();
        let mut framed = FramedRead::new(&mut stream, FrameCodec::new(1_024));

        let decoded_request = framed.next().await.unwrap().unwrap();
        assert_eq!(decoded_request, request);

        let decoded_response = framed.next().await.unwrap().unwrap();
        assert_eq!(decoded_response, response);

        assert!(framed.next().await.is_none());
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut buffer = BytesMut::new();
        let mut codec = FrameCodec::new(4);

        assert!(codec.encode(Bytes::from_static(b"too long"), &mut buffer).is_err());
    }
}
