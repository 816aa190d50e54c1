//! Bridge from request body shapes to the engine's upload input.
//!
//! # Design
//! The engine pulls upload bytes with "give me up to N bytes" reads, or reads
//! an open file on its own. `bridge` turns each `RequestBody` shape into one of
//! those two inputs. Chunk iterators are buffered through an explicit state
//! machine so that reads of any size can be served from chunks of any size.

use std::fs::File;
use std::io::{self, Read};

use bytes::{Bytes, BytesMut};

use crate::body::RequestBody;
use crate::error::{BuildError, BuildResult};

/// Upload input handed to the engine.
#[derive(Debug)]
pub enum UploadSource {
    /// Pulled through `BodyReader::read_chunk`.
    Reader { reader: BodyReader, size: Option<u64> },
    /// Read by the engine directly.
    File { file: File, size: Option<u64> },
}

impl UploadSource {
    pub fn size(&self) -> Option<u64> {
        match self {
            UploadSource::Reader { size, .. } | UploadSource::File { size, .. } => *size,
        }
    }
}

/// Bridge a request body into an upload source without consuming any data.
pub fn bridge(body: RequestBody) -> BuildResult<UploadSource> {
    match body {
        RequestBody::Stream { reader, size } => Ok(UploadSource::Reader {
            reader: BodyReader::new(ReaderSource::Stream(reader)),
            size,
        }),
        RequestBody::File(file) => {
            let meta = file
                .metadata()
                .map_err(|e| BuildError::InvalidBody(format!("unreadable file handle: {e}")))?;
            if meta.is_dir() {
                return Err(BuildError::InvalidBody("file handle refers to a directory".into()));
            }
            let size = meta.is_file().then(|| meta.len());
            Ok(UploadSource::File { file, size })
        }
        RequestBody::Chunks(chunks) => Ok(UploadSource::Reader {
            reader: BodyReader::new(ReaderSource::Chunks(ChunkBuffer::new(chunks))),
            size: None,
        }),
        RequestBody::Text(text) => Ok(UploadSource::from_memory(Bytes::from(text))),
        RequestBody::Bytes(bytes) => Ok(UploadSource::from_memory(bytes)),
    }
}

impl UploadSource {
    fn from_memory(bytes: Bytes) -> Self {
        let size = Some(bytes.len() as u64);
        UploadSource::Reader {
            reader: BodyReader::new(ReaderSource::Memory(bytes)),
            size,
        }
    }
}

enum ReaderSource {
    Stream(Box<dyn Read + Send>),
    Chunks(ChunkBuffer),
    Memory(Bytes),
}

/// Pull-based reader the engine calls for upload bytes.
pub struct BodyReader {
    source: ReaderSource,
}

impl BodyReader {
    fn new(source: ReaderSource) -> Self {
        Self { source }
    }

    /// Return up to `max_len` bytes; an empty result means the body is done.
    pub fn read_chunk(&mut self, max_len: usize) -> io::Result<Bytes> {
        match &mut self.source {
            ReaderSource::Stream(reader) => {
                let mut buf = Vec::with_capacity(max_len.min(64 * 1024));
                reader.take(max_len as u64).read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
            ReaderSource::Chunks(buffer) => Ok(buffer.read(max_len)),
            ReaderSource::Memory(bytes) => {
                let take = max_len.min(bytes.len());
                Ok(bytes.split_to(take))
            }
        }
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = self.read_chunk(buf.len())?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

impl std::fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.source {
            ReaderSource::Stream(_) => "stream",
            ReaderSource::Chunks(_) => "chunks",
            ReaderSource::Memory(_) => "memory",
        };
        f.debug_struct("BodyReader").field("source", &kind).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Bytes are waiting in the buffer.
    Buffered,
    /// Buffer is empty; the iterator may still yield.
    NeedsMore,
    /// The iterator is done; only buffered bytes remain.
    Exhausted,
}

struct ChunkBuffer {
    chunks: Box<dyn Iterator<Item = Bytes> + Send>,
    buffer: BytesMut,
    state: ChunkState,
}

impl ChunkBuffer {
    fn new(chunks: Box<dyn Iterator<Item = Bytes> + Send>) -> Self {
        Self {
            chunks,
            buffer: BytesMut::new(),
            state: ChunkState::NeedsMore,
        }
    }

    fn pull(&mut self) {
        match self.chunks.next() {
            Some(chunk) => {
                self.buffer.extend_from_slice(&chunk);
                if !self.buffer.is_empty() {
                    self.state = ChunkState::Buffered;
                }
            }
            None => self.state = ChunkState::Exhausted,
        }
    }

    fn read(&mut self, max_len: usize) -> Bytes {
        while self.state != ChunkState::Exhausted && self.buffer.len() < max_len {
            self.pull();
        }
        let take = max_len.min(self.buffer.len());
        let out = self.buffer.split_to(take).freeze();
        if self.state == ChunkState::Buffered && self.buffer.is_empty() {
            self.state = ChunkState::NeedsMore;
        }
        out
    }
}
