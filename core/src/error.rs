//! Error types for the transfer adapter.
//!
//! # Design
//! Two classes of failure are kept apart. `BuildError` is returned while
//! turning a `Request` into engine options and always aborts the call before
//! any transfer starts. `TransferError` is never returned as an `Err`: it is
//! stored in `Response::error` so that network failures travel the normal
//! data path alongside best-effort default fields.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Reference printed when the engine reports a code without any text.
pub const ENGINE_ERROR_DOCS: &str = "see https://curl.se/libcurl/c/libcurl-errors.html";

/// Errors raised while building transport options.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The request body cannot be handed to the engine.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("TLS CA bundle not found: {}", .0.display())]
    CaBundleNotFound(PathBuf),

    #[error("TLS certificate not found: {}", .0.display())]
    CertificateNotFound(PathBuf),

    #[error("TLS private key not found: {}", .0.display())]
    PrivateKeyNotFound(PathBuf),

    #[error("progress client option must be callable")]
    ProgressNotCallable,

    /// `save_to` held a value that is neither a path, a file, nor a stream.
    #[error("save_to must be a path, an open file or a stream, got {0}")]
    InvalidSaveTo(&'static str),

    #[error("directory {} does not exist for save_to value of {}", .dir.display(), .path.display())]
    SaveToDirectoryMissing { dir: PathBuf, path: PathBuf },

    /// A client setting had the wrong shape for its key.
    #[error("client setting `{key}` expects {expected}")]
    InvalidSetting { key: String, expected: &'static str },

    #[error("I/O error while preparing transfer: {0}")]
    Io(#[from] std::io::Error),
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Broad category of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferErrorKind {
    /// The peer was never reached: resolve, connect, TLS connect, timeout or
    /// an empty reply.
    Connect,
    Transfer,
}

/// Structured failure stored in `Response::error`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct TransferError {
    pub kind: TransferErrorKind,
    pub code: i32,
    pub message: String,
}

impl TransferError {
    /// Engine codes that mean the request never reached the server.
    const CONNECT_CODES: [i32; 5] = [
        6,  // could not resolve host
        7,  // could not connect
        28, // operation timed out
        35, // TLS connect error
        52, // got nothing
    ];

    /// Build an error from the engine's numeric code and optional text.
    pub fn from_engine(code: i32, text: Option<&str>) -> Self {
        let detail = match text {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => ENGINE_ERROR_DOCS,
        };
        Self::with_message(code, format!("transfer error {code}: {detail}"))
    }

    /// Build an error carrying a fully formed message.
    pub fn with_message(code: i32, message: String) -> Self {
        let kind = if Self::CONNECT_CODES.contains(&code) {
            TransferErrorKind::Connect
        } else {
            TransferErrorKind::Transfer
        };
        Self {
            kind,
            code,
            message,
        }
    }

    pub fn is_connect(&self) -> bool {
        self.kind == TransferErrorKind::Connect
    }
}
