use super::backend::ByteStream;
use super::logging::emit_frame_parse_error;
use crate::error::Result;
use crate::types::StreamFrame;
use futures::StreamExt;
use std::collections::VecDeque;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Incremental text to append to the assistant reply.
    Text(String),
    /// Server-side failure; ends the stream.
    Error(String),
}

/// Splits a chunked response body into `data: ` frames.
///
/// Bytes are buffered until a full line is available, so a line (or a
/// multi-byte character) split across network reads decodes the same as one
/// delivered whole.
#[derive(Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;

        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let line_end = search_from + offset;
            if let Some(frame) = decode_line(&self.buffer[start..line_end]) {
                frames.push(frame);
            }
            start = line_end + 1;
            search_from = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.scanned = self.buffer.len();

        frames
    }

    /// Decodes whatever is left once the body ends without a final newline.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        decode_line(&rest)
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn decode_line(raw: &[u8]) -> Option<Frame> {
    let decoded = String::from_utf8_lossy(raw);
    let line = decoded.strip_suffix('\r').unwrap_or(&decoded);
    let data = line.strip_prefix(DATA_PREFIX)?.trim();

    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str::<StreamFrame>(data) {
        Ok(StreamFrame {
            error: Some(error), ..
        }) => Some(Frame::Error(error)),
        Ok(StreamFrame {
            text: Some(text), ..
        }) if !text.is_empty() => Some(Frame::Text(text)),
        Ok(_) => None,
        Err(parse_error) => {
            emit_frame_parse_error(data, &parse_error);
            None
        }
    }
}

/// Pull-style reader over a response body: one decoded frame per call.
pub struct FrameReader {
    stream: ByteStream,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    finished: bool,
}

impl FrameReader {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Returns `Ok(None)` once the body is exhausted.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }

            match self.stream.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    self.pending.extend(self.decoder.process(&chunk));
                }
                None => {
                    self.finished = true;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }
}
