use bytes::BytesMut;

use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Comment lines (keep-alives sent by
/// some gateways) and the `event`, `id`, `retry` fields are skipped.
///
/// Chunk boundaries may fall anywhere, even inside a multi-byte character,
/// so raw bytes are buffered and only complete events are decoded.
pub struct Sse {
    buf: BytesMut,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events already buffered first.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // A trailing partial event is dropped.
                return Ok(None);
            };
            self.buf.extend_from_slice(&bytes);
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // For `end-of-line`, we only handle line feed.
        //
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        while let Some(eol_idx) = find_event_end(&self.buf) {
            // Consume the bytes from the buffer.
            let raw = self.buf.split_to(eol_idx + 2);
            let Ok(text) = str::from_utf8(&raw[..eol_idx]) else {
                return Err(Error::InvalidPayload);
            };

            let mut data: Option<String> = None;
            for line in text.lines() {
                if line.starts_with(':') {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else {
                    return Err(Error::InvalidPayload);
                };
                let value = value.strip_prefix(' ').unwrap_or(value);
                match name {
                    "data" => {
                        let data = data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }

            if data.is_some() {
                return Ok(data);
            }
        }
        Ok(None)
    }
}

fn find_event_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}
