//! Tokio codec for relay envelope framing.
//!
//! Each [`Envelope`] travels as a 4-byte big-endian length prefix followed by
//! its JSON encoding. The codec wraps [`LengthDelimitedCodec`] for framing and
//! `serde_json` for the body.
//!
//! ```text
//! +----------------+-------------------------------+
//! | length (u32 BE)| JSON envelope (length bytes)  |
//! +----------------+-------------------------------+
//! ```
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//! use cardbridge_protocol::{Envelope, EnvelopeMeta, Message, RelayCodec};
//! use futures::{SinkExt, StreamExt};
//!
//! # async fn example() -> Result<(), cardbridge_protocol::CodecError> {
//! let stream = TcpStream::connect("127.0.0.1:1883").await?;
//! let mut framed = Framed::new(stream, RelayCodec::new());
//!
//! framed
//!     .send(Envelope::new(EnvelopeMeta::new("relay"), Message::RequestRelayInfo))
//!     .await?;
//!
//! if let Some(Ok(reply)) = framed.next().await {
//!     println!("Received: {:?}", reply);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # DoS Protection
//!
//! Frames larger than the configured maximum (default: 64 KB) are rejected
//! in both directions.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec, LengthDelimitedCodecError};

use crate::Envelope;

/// Default maximum frame size in bytes (64 KB).
///
/// Short APDUs and extended APDUs with hex encoding stay well below this.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors raised while framing envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame exceeds the configured maximum size.
    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    /// Frame body is not a valid envelope.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),

    /// Low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tokio codec for relay envelopes.
#[derive(Debug)]
pub struct RelayCodec {
    inner: LengthDelimitedCodec,
    max_frame_size: usize,
}

impl RelayCodec {
    /// Create a new codec with the default maximum frame size.
    ///
    /// # Example
    ///
    /// ```
    /// use cardbridge_protocol::RelayCodec;
    ///
    /// let codec = RelayCodec::new();
    /// assert_eq!(codec.max_frame_size(), 64 * 1024);
    /// ```
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new codec with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .big_endian()
            .max_frame_length(max_frame_size)
            .new_codec();

        Self {
            inner,
            max_frame_size,
        }
    }

    /// Get the current maximum frame size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for RelayCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RelayCodec {
    type Item = Envelope;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src) {
            Ok(Some(frame)) => Ok(Some(serde_json::from_slice(&frame)?)),
            Ok(None) => Ok(None),
            // The inner codec rejects the header before consuming it, so the
            // declared length is still at the front of `src`.
            Err(e) if is_oversize(&e) => Err(CodecError::FrameTooLarge {
                size: declared_length(src),
                max_size: self.max_frame_size,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_oversize(error: &std::io::Error) -> bool {
    error
        .get_ref()
        .is_some_and(|inner| inner.is::<LengthDelimitedCodecError>())
}

fn declared_length(src: &[u8]) -> usize {
    src.first_chunk::<4>()
        .map_or(0, |header| u32::from_be_bytes(*header) as usize)
}

impl Encoder<Envelope> for RelayCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;

        if body.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: body.len(),
                max_size: self.max_frame_size,
            });
        }

        self.inner.encode(Bytes::from(body), dst)?;
        Ok(())
    }
}
