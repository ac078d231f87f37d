//! Length-delimited framing: every CIFF record is a base-128 varint byte
//! length followed by the protobuf-encoded message body. The length prefix
//! is decoded with prost's delimiter codec.

use std::io::{self, BufRead, Read};

use ciff_common::{Result, error::Error};

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Upper bound on a single record body. Postings lists of the most frequent
/// terms in web-scale collections stay well below this.
pub const MAX_FRAME_LEN: u64 = 256 * 1024 * 1024;

/// Reads length-delimited frames from a byte stream, one at a time.
///
/// Only the body of the current frame is buffered; the buffer is reused
/// between frames.
pub struct FrameReader<R> {
    inner: R,
    offset: u64,
    body: Vec<u8>,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> FrameReader<R> {
        FrameReader {
            inner,
            offset: 0,
            body: Vec::new(),
        }
    }

    /// Byte offset (within the decompressed stream) of the next frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next frame and returns its body.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly at a frame boundary.
    /// An end of stream inside the length prefix or the body, an overlong
    /// prefix, an oversized body and any underlying read failure (including
    /// decompression errors) are reported as `CorruptStream` errors tagged with
    /// the given record `ordinal`.
    pub fn next_frame(&mut self, ordinal: u64) -> Result<Option<&[u8]>> {
        let frame_start = self.offset;
        let len = match self.read_length_prefix(ordinal, frame_start)? {
            Some(len) => len as u64,
            None => return Ok(None),
        };
        if len > MAX_FRAME_LEN {
            return Err(Error::corrupt_stream(
                ordinal,
                frame_start,
                format!("record length {len} exceeds the limit of {MAX_FRAME_LEN} bytes"),
            ));
        }

        self.body.resize(len as usize, 0);
        if let Err(e) = self.inner.read_exact(&mut self.body) {
            let message = if e.kind() == io::ErrorKind::UnexpectedEof {
                format!("stream ended inside a {len}-byte record body")
            } else {
                format!("failed to read record body: {e}")
            };
            return Err(Error::corrupt_stream(ordinal, frame_start, message));
        }
        self.offset += len;
        Ok(Some(&self.body))
    }

    /// Decodes the varint length prefix straight from the reader's buffer.
    /// A prefix split across two buffer fills is gathered into a small stack
    /// buffer first.
    fn read_length_prefix(&mut self, ordinal: u64, frame_start: u64) -> Result<Option<usize>> {
        let mut prefix = [0u8; MAX_VARINT_LEN];
        let mut filled = 0;
        loop {
            let available = match self.inner.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Error::corrupt_stream(
                        ordinal,
                        frame_start,
                        format!("failed to read record length prefix: {e}"),
                    ));
                }
            };
            if available.is_empty() {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(Error::corrupt_stream(
                    ordinal,
                    frame_start,
                    "stream ended inside a record length prefix",
                ));
            }

            let window = &available[..available.len().min(MAX_VARINT_LEN - filled)];
            let (taken, terminated) = match window.iter().position(|b| b & 0x80 == 0) {
                Some(pos) => (pos + 1, true),
                None => (window.len(), false),
            };
            let decoded = if terminated && filled == 0 {
                Some(decode_length(&window[..taken]))
            } else {
                prefix[filled..filled + taken].copy_from_slice(&window[..taken]);
                terminated.then(|| decode_length(&prefix[..filled + taken]))
            };
            self.inner.consume(taken);
            self.offset += taken as u64;
            filled += taken;

            match decoded {
                Some(Ok(len)) => return Ok(Some(len)),
                Some(Err(e)) => {
                    return Err(Error::corrupt_stream(
                        ordinal,
                        frame_start,
                        format!("invalid record length prefix: {e}"),
                    ));
                }
                None if filled == MAX_VARINT_LEN => {
                    return Err(Error::corrupt_stream(
                        ordinal,
                        frame_start,
                        "record length prefix exceeds 10 bytes",
                    ));
                }
                None => {}
            }
        }
    }
}

fn decode_length(mut bytes: &[u8]) -> std::result::Result<usize, prost::DecodeError> {
    prost::decode_length_delimiter(&mut bytes)
}
