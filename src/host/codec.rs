//! Native-messaging framing: a 4-byte length in native byte order followed by
//! that many bytes of UTF-8 JSON.

use crate::error::{HostError, HostResult};
use serde::Serialize;
use serde_json::Value;

/// Width of the length prefix.
pub const PREFIX_LEN: usize = 4;

/// Serialize `value` into one frame.
pub fn encode<T: Serialize>(value: &T, max_len: usize) -> HostResult<Vec<u8>> {
    let payload =
        serde_json::to_vec(value).map_err(|err| HostError::Encoding(err.to_string()))?;
    if payload.len() > max_len {
        return Err(HostError::FrameTooLarge {
            len: payload.len(),
            max: max_len,
        });
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| HostError::Encoding(format!("payload of {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_ne_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Incremental decoder owning the connection's buffer of undecoded bytes.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_len: usize,
}

impl FrameDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_len,
        }
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append `chunk` and return every frame it completes, in order.
    ///
    /// A chunk may hold any number of frames or only part of one; the trailing
    /// partial frame is kept for the next call. An oversized length or a payload
    /// that is not JSON clears the buffer and returns a protocol error, dropping
    /// anything else decoded from this chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> HostResult<Vec<Value>> {
        self.buffer.extend_from_slice(chunk);

        let mut values = Vec::new();
        let mut offset = 0;
        while let Some(prefix) = self.buffer.get(offset..offset + PREFIX_LEN) {
            let mut len_bytes = [0u8; PREFIX_LEN];
            len_bytes.copy_from_slice(prefix);
            let len = u32::from_ne_bytes(len_bytes) as usize;
            if len > self.max_len {
                self.buffer.clear();
                return Err(HostError::Protocol(format!(
                    "declared frame length {len} exceeds limit {}",
                    self.max_len
                )));
            }

            let start = offset + PREFIX_LEN;
            let Some(payload) = self.buffer.get(start..start + len) else {
                break;
            };
            match serde_json::from_slice(payload) {
                Ok(value) => values.push(value),
                Err(err) => {
                    self.buffer.clear();
                    return Err(HostError::Protocol(format!("invalid JSON payload: {err}")));
                }
            }
            offset = start + len;
        }

        self.buffer.drain(..offset);
        Ok(values)
    }
}
