//! Request and response body representations.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

/// A readable, writable, seekable byte stream that can be shared with the
/// engine.
pub trait BodyStream: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> BodyStream for T {}

pub type SharedStream = Arc<Mutex<dyn BodyStream>>;

pub fn shared_stream<S: BodyStream + 'static>(stream: S) -> SharedStream {
    Arc::new(Mutex::new(stream))
}

/// Body attached to an outgoing request.
pub enum RequestBody {
    Text(String),
    Bytes(Bytes),
    /// An already-open file, read directly by the engine.
    File(File),
    /// A stream object; `size` is reported when known up front.
    Stream {
        reader: Box<dyn Read + Send>,
        size: Option<u64>,
    },
    /// A pull iterator of chunks; finite and not restartable.
    Chunks(Box<dyn Iterator<Item = Bytes> + Send>),
}

impl RequestBody {
    pub fn stream<R: Read + Send + 'static>(reader: R, size: Option<u64>) -> Self {
        RequestBody::Stream {
            reader: Box::new(reader),
            size,
        }
    }

    pub fn chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes> + 'static,
    {
        RequestBody::Chunks(Box::new(chunks.into_iter().map(Into::into)))
    }

    /// True for bodies that are already in memory.
    pub fn is_string(&self) -> bool {
        matches!(self, RequestBody::Text(_) | RequestBody::Bytes(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Text(_) => "text",
            RequestBody::Bytes(_) => "bytes",
            RequestBody::File(_) => "file",
            RequestBody::Stream { .. } => "stream",
            RequestBody::Chunks(_) => "chunks",
        }
    }

    /// Drain the body into memory.
    pub fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            RequestBody::Text(text) => Ok(Bytes::from(text)),
            RequestBody::Bytes(bytes) => Ok(bytes),
            RequestBody::File(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
            RequestBody::Stream { mut reader, .. } => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
            RequestBody::Chunks(chunks) => {
                let mut buf = Vec::new();
                for chunk in chunks {
                    buf.extend_from_slice(&chunk);
                }
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<File> for RequestBody {
    fn from(file: File) -> Self {
        RequestBody::File(file)
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::File(file) => f.debug_tuple("File").field(file).finish(),
            RequestBody::Stream { size, .. } => f.debug_struct("Stream").field("size", size).finish(),
            RequestBody::Chunks(_) => f.write_str("Chunks"),
        }
    }
}

/// Handle to the bytes of a response.
///
/// Clones share the same underlying stream and position.
#[derive(Clone)]
pub struct ResponseBody {
    stream: SharedStream,
}

impl ResponseBody {
    pub fn from_shared(stream: SharedStream) -> Self {
        Self { stream }
    }

    pub fn from_file(file: File) -> Self {
        Self::from_shared(shared_stream(file))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_shared(shared_stream(Cursor::new(bytes.into())))
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, dyn BodyStream + 'static>> {
        self.stream
            .lock()
            .map_err(|_| io::Error::other("response body lock poisoned"))
    }

    pub fn rewind(&self) -> io::Result<()> {
        self.lock()?.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Read from the current position to the end.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.lock()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        String::from_utf8(self.read_to_vec()?).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.lock()?.read(buf)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseBody(..)")
    }
}

/// File-backed stream that is only created when first touched.
#[derive(Debug)]
pub struct LazyFile {
    path: PathBuf,
    file: Option<File>,
}

impl LazyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lazy file failed to open"))
    }
}

impl Read for LazyFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.open()?.read(buf)
    }
}

impl Write for LazyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.open()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Seek for LazyFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.open()?.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_bytes_count_as_strings() {
        assert!(RequestBody::from("abc").is_string());
        assert!(RequestBody::from(vec![1u8, 2]).is_string());
        assert!(!RequestBody::stream(io::empty(), None).is_string());
        assert!(!RequestBody::chunks(vec!["a"]).is_string());
    }

    #[test]
    fn into_bytes_drains_every_shape() {
        assert_eq!(RequestBody::from("abc").into_bytes().unwrap(), "abc");
        let stream = RequestBody::stream(Cursor::new(b"from stream".to_vec()), Some(11));
        assert_eq!(stream.into_bytes().unwrap(), "from stream");
        let chunks = RequestBody::chunks(vec!["ab", "", "cd"]);
        assert_eq!(chunks.into_bytes().unwrap(), "abcd");
    }

    #[test]
    fn response_body_clones_share_position() {
        let body = ResponseBody::from_bytes("hello");
        let other = body.clone();
        assert_eq!(body.read_to_string().unwrap(), "hello");
        assert_eq!(other.read_to_string().unwrap(), "");
        other.rewind().unwrap();
        assert_eq!(body.read_to_string().unwrap(), "hello");
    }

    #[test]
    fn lazy_file_is_created_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut lazy = LazyFile::new(&path);
        assert!(!lazy.is_open());
        assert!(!path.exists());
        lazy.write_all(b"payload").unwrap();
        assert!(path.exists());
        lazy.seek(SeekFrom::Start(0)).unwrap();
        let mut read = String::new();
        lazy.read_to_string(&mut read).unwrap();
        assert_eq!(read, "payload");
    }

    #[test]
    fn lazy_file_flush_before_open_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut lazy = LazyFile::new(dir.path().join("never.bin"));
        lazy.flush().unwrap();
        assert!(!lazy.path().exists());
    }
}
