//! Incremental reading of server-sent events from a byte-chunk stream.

#[cfg(test)]
use std::collections::VecDeque;
use std::mem;

use bytes::Bytes;
use reqwest::Response;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The underlying connection failed mid-stream.
    Transport,
    /// The stream carried bytes that are not valid UTF-8.
    InvalidPayload,
}

/// A parsed server-sent event.
#[derive(Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// The value of the `event:` field, when the server named the event.
    pub name: Option<String>,
    /// The concatenated `data:` payload.
    pub data: String,
}

enum ChunkSource {
    Response(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

/// A type for reading server-sent events from a chunked response body.
///
/// The parser is incremental: chunk boundaries may fall anywhere,
/// including inside a multi-byte character, so bytes are buffered and
/// only complete lines (terminated by CRLF, CR, or LF, all ASCII) are
/// decoded.
pub struct Sse {
    source: ChunkSource,
    buf: Vec<u8>,
    exhausted: bool,
    name: Option<String>,
    data: String,
}

impl Sse {
    pub fn from_response(response: Response) -> Self {
        Self::with_source(ChunkSource::Response(response))
    }

    #[cfg(test)]
    pub fn from_chunks(chunks: VecDeque<Bytes>) -> Self {
        Self::with_source(ChunkSource::Scripted(chunks))
    }

    fn with_source(source: ChunkSource) -> Self {
        Self {
            source,
            buf: Vec::new(),
            exhausted: false,
            name: None,
            data: String::new(),
        }
    }

    /// Reads the next event, pulling more chunks as needed. Returns
    /// `None` once the body ends.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, Error> {
        loop {
            // Drain the lines that are already buffered. The grammar
            // allows CRLF, CR, and LF line ends.
            while let Some(pos) = self.buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                if self.buf[pos] == b'\r' && pos + 1 == self.buf.len() && !self.exhausted {
                    // May be half of a CRLF pair split across chunks;
                    // wait for the next byte before splitting here.
                    break;
                }
                let line_end = if self.buf[pos] == b'\r' && self.buf.get(pos + 1) == Some(&b'\n') {
                    pos + 1
                } else {
                    pos
                };
                let line: Vec<u8> = self.buf.drain(..=line_end).collect();
                let Ok(line) = str::from_utf8(&line) else {
                    return Err(Error::InvalidPayload);
                };
                if let Some(event) = self.accept_line(line.trim_end_matches(['\n', '\r'])) {
                    return Ok(Some(event));
                }
            }

            if self.exhausted {
                return Ok(None);
            }
            match self.next_chunk().await? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    /// Feeds one complete line into the parser, returning an event when
    /// the line terminates a non-empty one.
    fn accept_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            // Blank line dispatches the accumulated event. Blocks with
            // no data (e.g. comment-only keep-alives) produce nothing.
            let name = self.name.take();
            let data = mem::take(&mut self.data);
            if data.is_empty() {
                return None;
            }
            return Some(SseEvent { name, data });
        }
        if line.starts_with(':') {
            // Comment line.
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value);
            }
            "event" => {
                self.name = Some(value.to_owned());
            }
            // `id` and `retry` are not used by this client.
            _ => {}
        }
        None
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match &mut self.source {
            ChunkSource::Response(response) => {
                let Ok(chunk) = response.chunk().await else {
                    return Err(Error::Transport);
                };
                Ok(chunk)
            }
            #[cfg(test)]
            ChunkSource::Scripted(chunks) => Ok(chunks.pop_front()),
        }
    }
}
