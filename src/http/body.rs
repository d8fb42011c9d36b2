//! Message body framing and incremental reading.
//!
//! A [`BodyReader`] hands out a body piece by piece as it arrives on the
//! socket. Each [`BodyChunk`] carries both the raw wire bytes (what a relay
//! forwards untouched) and the decoded payload (what a transform consumes);
//! the two only differ for chunked transfer coding.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::parser::ParseError;
use crate::http::request::{Method, RequestHead};
use crate::http::response::ResponseHead;

const BUFFER_SIZE: usize = 8192;

/// How the end of a message body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body at all.
    Empty,
    /// Exactly this many bytes.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Everything until the peer closes the connection.
    UntilClose,
}

impl Framing {
    /// Request bodies are chunked, length-delimited, or absent.
    pub fn for_request(head: &RequestHead) -> Self {
        if head.headers.is_chunked() {
            return Framing::Chunked;
        }

        match head.content_length() {
            Some(0) | None => Framing::Empty,
            Some(n) => Framing::Length(n),
        }
    }

    /// Response framing also depends on the request method and status.
    pub fn for_response(head: &ResponseHead, request_method: &Method) -> Self {
        if *request_method == Method::HEAD
            || head.is_interim()
            || head.status == 204
            || head.status == 304
        {
            return Framing::Empty;
        }

        if head.status == 101 {
            return Framing::UntilClose;
        }

        if head.headers.contains("Transfer-Encoding") {
            return if head.headers.is_chunked() {
                Framing::Chunked
            } else {
                Framing::UntilClose
            };
        }

        match head.headers.content_length() {
            Ok(Some(0)) => Framing::Empty,
            Ok(Some(n)) => Framing::Length(n),
            Ok(None) | Err(_) => Framing::UntilClose,
        }
    }
}

/// One piece of a body as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyChunk {
    /// Bytes exactly as received, including any chunk-size lines.
    pub raw: Bytes,
    /// Payload bytes with transfer coding removed.
    pub data: Bytes,
}

impl BodyChunk {
    fn plain(bytes: Bytes) -> Self {
        Self {
            raw: bytes.clone(),
            data: bytes,
        }
    }
}

enum Progress {
    Length { remaining: u64 },
    Chunked(ChunkedDecoder),
    UntilClose,
    Done,
}

/// Reads one message body from `reader`, starting with bytes already buffered
/// while the head was parsed.
pub struct BodyReader<R> {
    reader: R,
    buffer: BytesMut,
    progress: Progress,
}

impl<R: AsyncRead + Unpin> BodyReader<R> {
    pub fn new(reader: R, buffered: BytesMut, framing: Framing) -> Self {
        let progress = match framing {
            Framing::Empty | Framing::Length(0) => Progress::Done,
            Framing::Length(remaining) => Progress::Length { remaining },
            Framing::Chunked => Progress::Chunked(ChunkedDecoder::new()),
            Framing::UntilClose => Progress::UntilClose,
        };

        Self {
            reader,
            buffer: buffered,
            progress,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.progress, Progress::Done)
    }

    /// Returns the next piece of the body, or `None` once it is complete.
    ///
    /// A peer that closes before a length-delimited or chunked body is
    /// complete yields an `UnexpectedEof` error.
    pub async fn next_chunk(&mut self) -> io::Result<Option<BodyChunk>> {
        match &mut self.progress {
            Progress::Done => Ok(None),

            Progress::Length { remaining } => {
                if self.buffer.is_empty() && fill(&mut self.reader, &mut self.buffer).await? == 0 {
                    return Err(truncated());
                }

                let take = self.buffer.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
                let chunk = self.buffer.split_to(take).freeze();
                *remaining -= take as u64;

                if *remaining == 0 {
                    self.progress = Progress::Done;
                }
                Ok(Some(BodyChunk::plain(chunk)))
            }

            Progress::UntilClose => {
                if self.buffer.is_empty() && fill(&mut self.reader, &mut self.buffer).await? == 0 {
                    self.progress = Progress::Done;
                    return Ok(None);
                }
                Ok(Some(BodyChunk::plain(self.buffer.split().freeze())))
            }

            Progress::Chunked(decoder) => {
                if self.buffer.is_empty() && fill(&mut self.reader, &mut self.buffer).await? == 0 {
                    return Err(truncated());
                }

                let mut data = BytesMut::new();
                let consumed = decoder
                    .feed(&self.buffer, &mut data)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                let raw = self.buffer.split_to(consumed).freeze();

                if decoder.is_done() {
                    self.progress = Progress::Done;
                }
                Ok(Some(BodyChunk {
                    raw,
                    data: data.freeze(),
                }))
            }
        }
    }

    /// Reads the rest of the body, returning the decoded payload.
    pub async fn collect(&mut self) -> io::Result<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk.data);
        }
        Ok(body.freeze())
    }

    /// Reads the rest of the body, returning the wire bytes unchanged.
    pub async fn collect_raw(&mut self) -> io::Result<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk.raw);
        }
        Ok(body.freeze())
    }

    /// Reads and discards the rest of the body. Returns the payload size.
    pub async fn discard(&mut self) -> io::Result<u64> {
        let mut total = 0;
        while let Some(chunk) = self.next_chunk().await? {
            total += chunk.data.len() as u64;
        }
        Ok(total)
    }
}

async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut BytesMut) -> io::Result<usize> {
    buffer.reserve(BUFFER_SIZE);
    reader.read_buf(buffer).await
}

fn truncated() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed before the body was complete",
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    TrailerStart,
    Trailer,
    EndLf,
    Done,
}

/// Incremental decoder for `Transfer-Encoding: chunked`.
///
/// Works byte by byte so input may be split anywhere, including inside a
/// chunk-size line.
#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: ChunkState,
    size: u64,
    digits: usize,
    remaining: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            state: ChunkState::Size,
            size: 0,
            digits: 0,
            remaining: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }

    /// Consumes bytes from `input`, appending payload bytes to `out`.
    ///
    /// Returns how many input bytes belong to this body. That is all of them
    /// unless the terminating chunk ends inside `input`.
    pub fn feed(&mut self, input: &[u8], out: &mut BytesMut) -> Result<usize, ParseError> {
        let mut i = 0;

        while i < input.len() && self.state != ChunkState::Done {
            if self.state == ChunkState::Data {
                let available = input.len() - i;
                let take = available.min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
                out.extend_from_slice(&input[i..i + take]);
                self.remaining -= take as u64;
                i += take;
                if self.remaining == 0 {
                    self.state = ChunkState::DataCr;
                }
                continue;
            }

            let byte = input[i];
            i += 1;

            self.state = match (self.state, byte) {
                (ChunkState::Size, b) if b.is_ascii_hexdigit() => {
                    let digit = (b as char).to_digit(16).unwrap_or(0) as u64;
                    self.size = self
                        .size
                        .checked_mul(16)
                        .and_then(|s| s.checked_add(digit))
                        .ok_or(ParseError::InvalidChunk)?;
                    self.digits += 1;
                    ChunkState::Size
                }
                (ChunkState::Size, b';' | b' ' | b'\t') if self.digits > 0 => ChunkState::Extension,
                (ChunkState::Size, b'\r') if self.digits > 0 => ChunkState::SizeLf,
                (ChunkState::Size, b'\n') if self.digits > 0 => self.end_size_line(),
                (ChunkState::Size, _) => return Err(ParseError::InvalidChunk),

                (ChunkState::Extension, b'\r') => ChunkState::SizeLf,
                (ChunkState::Extension, b'\n') => self.end_size_line(),
                (ChunkState::Extension, _) => ChunkState::Extension,

                (ChunkState::SizeLf, b'\n') => self.end_size_line(),
                (ChunkState::SizeLf, _) => return Err(ParseError::InvalidChunk),

                (ChunkState::DataCr, b'\r') => ChunkState::DataLf,
                (ChunkState::DataCr, b'\n') | (ChunkState::DataLf, b'\n') => ChunkState::Size,
                (ChunkState::DataCr | ChunkState::DataLf, _) => return Err(ParseError::InvalidChunk),

                (ChunkState::TrailerStart, b'\r') => ChunkState::EndLf,
                (ChunkState::TrailerStart, b'\n') => ChunkState::Done,
                (ChunkState::TrailerStart, _) => ChunkState::Trailer,

                (ChunkState::Trailer, b'\n') => ChunkState::TrailerStart,
                (ChunkState::Trailer, _) => ChunkState::Trailer,

                (ChunkState::EndLf, b'\n') => ChunkState::Done,
                (ChunkState::EndLf, _) => return Err(ParseError::InvalidChunk),

                (ChunkState::Data | ChunkState::Done, _) => unreachable!("handled above"),
            };
        }

        Ok(i)
    }

    fn end_size_line(&mut self) -> ChunkState {
        let size = std::mem::take(&mut self.size);
        self.digits = 0;

        if size == 0 {
            ChunkState::TrailerStart
        } else {
            self.remaining = size;
            ChunkState::Data
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}
