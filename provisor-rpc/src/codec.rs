//! Message framing.
//!
//! Every message is preceded by a header block, as in the Language Server
//! Protocol:
//!
//! ```text
//! Content-Length: 29\r\n
//! \r\n
//! {"id":0,"method":"resources"}
//! ```
//!
//! Unknown header fields are ignored; `Content-Length` is required.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frames larger than this are refused rather than buffered.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

const HEADER_END: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &str = "content-length";

#[derive(Debug, Default)]
pub struct ContentLengthCodec {
    /// Body length of the frame whose header was already consumed.
    pending_length: Option<usize>,
}

impl ContentLengthCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_header(header: &[u8]) -> io::Result<usize> {
        let header = std::str::from_utf8(header)
            .map_err(|e| invalid_data(format!("frame header is not UTF-8: {}", e)))?;
        let mut length = None;
        for line in header.split("\r\n") {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| invalid_data(format!("malformed header line: {:?}", line)))?;
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let n = value.trim().parse::<usize>().map_err(|e| {
                    invalid_data(format!("invalid Content-Length {:?}: {}", value, e))
                })?;
                length = Some(n);
            }
        }
        let length = length.ok_or_else(|| invalid_data("frame header without Content-Length"))?;
        if length > MAX_FRAME_LENGTH {
            return Err(invalid_data(format!(
                "frame of {} bytes exceeds the limit of {} bytes",
                length, MAX_FRAME_LENGTH
            )));
        }
        Ok(length)
    }
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl Decoder for ContentLengthCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        let length = match self.pending_length {
            Some(n) => n,
            None => {
                let Some(end) = src.windows(HEADER_END.len()).position(|w| w == HEADER_END)
                else {
                    if src.len() > MAX_FRAME_LENGTH {
                        return Err(invalid_data("frame header too long"));
                    }
                    return Ok(None);
                };
                let n = Self::parse_header(&src[..end])?;
                src.advance(end + HEADER_END.len());
                self.pending_length = Some(n);
                n
            }
        };

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }
        self.pending_length = None;
        let body = src.split_to(length);
        String::from_utf8(body.to_vec())
            .map(Some)
            .map_err(|e| invalid_data(format!("frame body is not UTF-8: {}", e)))
    }
}

impl Encoder<String> for ContentLengthCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> io::Result<()> {
        let body = item.as_bytes();
        if body.len() > MAX_FRAME_LENGTH {
            return Err(invalid_data(format!(
                "refusing to send a frame of {} bytes",
                body.len()
            )));
        }
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        dst.reserve(header.len() + body.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(body);
        Ok(())
    }
}
