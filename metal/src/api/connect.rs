//! Connect protocol envelopes for server-streaming calls
//!
//! Every streamed message is prefixed by one flags byte and a big-endian u32
//! length. The final message carries flag 0x02 and a JSON trailer that
//! reports the stream outcome.

use super::error::{ApiError, RpcErrorBody};
use serde::Deserialize;
use std::collections::HashMap;

pub const FLAG_COMPRESSED: u8 = 0x01;
pub const FLAG_END_STREAM: u8 = 0x02;

const PREFIX_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub flags: u8,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn is_end_stream(&self) -> bool {
        self.flags & FLAG_END_STREAM != 0
    }
}

pub fn encode_envelope(flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.push(flags);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Reassembles envelopes from arbitrarily split body chunks
#[derive(Debug, Default)]
pub struct EnvelopeDecoder {
    buffer: Vec<u8>,
}

impl EnvelopeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes received that do not yet form a complete envelope
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn next_envelope(&mut self) -> Result<Option<Envelope>, ApiError> {
        if self.buffer.len() < PREFIX_LEN {
            return Ok(None);
        }
        let flags = self.buffer[0];
        let len = u32::from_be_bytes([
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
            self.buffer[4],
        ]) as usize;
        if self.buffer.len() < PREFIX_LEN + len {
            return Ok(None);
        }
        if flags & FLAG_COMPRESSED != 0 {
            return Err(ApiError::Parse(
                "compressed stream messages are not supported".to_string(),
            ));
        }

        let payload = self.buffer[PREFIX_LEN..PREFIX_LEN + len].to_vec();
        self.buffer.drain(..PREFIX_LEN + len);
        Ok(Some(Envelope { flags, payload }))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EndStreamMessage {
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Vec<String>>>,
}

impl EndStreamMessage {
    pub fn parse(payload: &[u8]) -> Result<Self, ApiError> {
        if payload.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(payload)
            .map_err(|e| ApiError::Parse(format!("invalid end-of-stream message: {}", e)))
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}
