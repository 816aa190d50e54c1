//! Conversion of raw engine output into a `Response`.
//!
//! # Design
//! The engine reports three things: header lines (through `HeaderSink`), a
//! numeric error code with optional text, and transfer statistics. The body
//! is already sitting in the destination chosen by the builder. `normalize`
//! combines them without doing any I/O of its own beyond rewinding the body.

use serde::Deserialize;
use tracing::{trace, warn};

use crate::body::ResponseBody;
use crate::error::TransferError;
use crate::http::{Headers, Response, TransferStats};

/// Collects raw header lines as the engine emits them.
///
/// A blank line ends a header block. When redirects or `100 Continue` produce
/// several blocks, a line arriving after the blank one starts over so that
/// only the final block is kept.
#[derive(Debug, Default, Clone)]
pub struct HeaderSink {
    lines: Vec<String>,
    block_ended: bool,
}

impl HeaderSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one raw line, including any trailing CRLF.
    ///
    /// Returns the number of bytes consumed, which engines expect back from
    /// their header callback.
    pub fn push_raw(&mut self, raw: &str) -> usize {
        let line = raw.trim();
        if line.is_empty() {
            self.block_ended = true;
        } else {
            if self.block_ended {
                self.lines.clear();
                self.block_ended = false;
            }
            self.lines.push(line.to_owned());
        }
        raw.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// What the engine reports once a transfer finishes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTransfer {
    /// Zero on success.
    pub error_code: i32,
    pub error_message: Option<String>,
    /// Adapter-supplied message that replaces the engine's own text.
    pub message_override: Option<String>,
    pub stats: TransferStats,
}

impl RawTransfer {
    pub fn ok(stats: TransferStats) -> Self {
        Self {
            stats,
            ..Self::default()
        }
    }

    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Build the response for a finished transfer.
pub fn normalize(raw: RawTransfer, headers: HeaderSink, body: Option<ResponseBody>) -> Response {
    let RawTransfer {
        error_code,
        error_message,
        message_override,
        stats,
    } = raw;

    let mut response = Response {
        effective_url: stats.url.clone(),
        transfer_stats: stats,
        ..Response::default()
    };

    let mut lines = headers.into_lines().into_iter();
    let status_line = lines.next();
    let status = status_line.as_deref().and_then(parse_status_line);

    let Some((version, code, reason)) = status.filter(|_| error_code == 0) else {
        let error = match message_override {
            Some(message) => TransferError::with_message(error_code, message),
            None => TransferError::from_engine(error_code, error_message.as_deref()),
        };
        warn!(
            code = error.code,
            kind = ?error.kind,
            url = response.effective_url.as_deref().unwrap_or(""),
            "transfer failed: {}",
            error.message
        );
        response.error = Some(error);
        return response;
    };

    if let Some(body) = &body {
        if let Err(e) = body.rewind() {
            warn!(error = %e, "could not rewind response body");
        }
    }

    response.status = Some(code);
    response.reason = reason;
    response.version = version;
    response.headers = Headers::from_lines(lines);
    response.body = body;
    trace!(status = code, headers = response.headers.len(), "normalized response");
    response
}

/// Split `HTTP/1.1 200 OK` into version, code and reason.
fn parse_status_line(line: &str) -> Option<(Option<String>, u16, Option<String>)> {
    let (protocol, rest) = line.trim().split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    let (code, reason) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let code = code.parse().ok()?;
    let reason = Some(reason.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_owned);
    let version = protocol
        .strip_prefix("HTTP/")
        .filter(|v| !v.is_empty())
        .map(str::to_owned);
    Some((version, code, reason))
}
