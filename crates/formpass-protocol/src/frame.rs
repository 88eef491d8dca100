// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire format for QUIC stream framing.
//!
//! Each QUIC stream carries one RPC call. A frame is:
//! - 4 bytes: payload length (big-endian)
//! - 2 bytes: message type (big-endian)
//! - N bytes: protobuf payload

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame payload size (1 MB). A passage is a handful of short strings.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame header size (4 bytes length + 2 bytes type)
pub const HEADER_SIZE: usize = 6;

/// Message types for the wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    /// Request message
    Request = 1,
    /// Response message
    Response = 2,
    /// Error response (payload may be empty)
    Error = 3,
}

impl TryFrom<u16> for MessageType {
    type Error = FrameError;

    fn try_from(value: u16) -> Result<Self, <Self as TryFrom<u16>>::Error> {
        match value {
            1 => Ok(MessageType::Request),
            2 => Ok(MessageType::Response),
            3 => Ok(MessageType::Error),
            _ => Err(FrameError::InvalidMessageType(value)),
        }
    }
}

/// Errors that can occur during frame encoding/decoding
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("invalid message type: {0}")]
    InvalidMessageType(u16),

    #[error("truncated frame: {0}")]
    Truncated(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("connection closed")]
    ConnectionClosed,
}

/// Payload length and type from a frame header
fn parse_header(mut header: &[u8]) -> Result<(usize, MessageType), FrameError> {
    if header.len() < HEADER_SIZE {
        return Err(FrameError::Truncated("header"));
    }
    let length = header.get_u32() as usize;
    let message_type = MessageType::try_from(header.get_u16())?;
    if length > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge(length));
    }
    Ok((length, message_type))
}

/// A framed message with type and payload
#[derive(Debug, Clone)]
pub struct Frame {
    /// What the payload is
    pub message_type: MessageType,
    /// Encoded protobuf message
    pub payload: Bytes,
}

impl Frame {
    /// Frame `msg` as a request
    pub fn request<M: Message>(msg: &M) -> Result<Self, FrameError> {
        Self::new(MessageType::Request, msg)
    }

    /// Frame `msg` as a response
    pub fn response<M: Message>(msg: &M) -> Result<Self, FrameError> {
        Self::new(MessageType::Response, msg)
    }

    /// Error frame with an empty payload; the type alone signals failure.
    pub fn empty_error() -> Self {
        Self {
            message_type: MessageType::Error,
            payload: Bytes::new(),
        }
    }

    /// Encode `msg` under the given type, refusing oversized payloads
    pub fn new<M: Message>(message_type: MessageType, msg: &M) -> Result<Self, FrameError> {
        let size = msg.encoded_len();
        if size > MAX_FRAME_SIZE {
            return Err(FrameError::FrameTooLarge(size));
        }
        Ok(Self {
            message_type,
            payload: Bytes::from(msg.encode_to_vec()),
        })
    }

    /// Decode the payload as a protobuf message
    pub fn decode<M: Message + Default>(&self) -> Result<M, FrameError> {
        Ok(M::decode(self.payload.clone())?)
    }

    /// Header followed by payload
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u32(self.payload.len() as u32);
        buf.put_u16(self.message_type as u16);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Parse one frame from the front of a complete buffer
    pub fn decode_from_bytes(mut bytes: Bytes) -> Result<Self, FrameError> {
        let (length, message_type) = parse_header(&bytes)?;
        bytes.advance(HEADER_SIZE);
        if bytes.len() < length {
            return Err(FrameError::Truncated("payload"));
        }
        Ok(Self {
            message_type,
            payload: bytes.split_to(length),
        })
    }
}

/// Write a frame to an async writer
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), FrameError> {
    writer.write_all(&frame.encode()).await?;
    Ok(())
}

/// Read one frame. A stream that ends before any header byte is `ConnectionClosed`.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, FrameError> {
    let mut header = [0u8; HEADER_SIZE];
    if let Err(e) = reader.read_exact(&mut header).await {
        return Err(match e.kind() {
            std::io::ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
            _ => e.into(),
        });
    }

    // Validated before the payload buffer is allocated.
    let (length, message_type) = parse_header(&header)?;

    let mut payload = BytesMut::zeroed(length);
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FrameError::Truncated("payload"),
        _ => e.into(),
    })?;

    Ok(Frame {
        message_type,
        payload: payload.freeze(),
    })
}
