//! Engine option set built for a single transfer.
//!
//! Keys are the engine's integer option codes so that raw overrides supplied
//! by callers land on exactly the same entries the builder computes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::body::SharedStream;
use crate::settings::ProgressFn;
use crate::stream::BodyReader;

/// Integer code of an engine option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionKey(pub u32);

impl OptionKey {
    pub const FILE: Self = Self(10_001);
    pub const URL: Self = Self(10_002);
    pub const PROXY: Self = Self(10_004);
    pub const INFILE: Self = Self(10_009);
    pub const WRITEFUNCTION: Self = Self(20_011);
    pub const READFUNCTION: Self = Self(20_012);
    pub const TIMEOUT: Self = Self(13);
    pub const INFILESIZE: Self = Self(14);
    pub const POSTFIELDS: Self = Self(10_015);
    pub const HTTPHEADER: Self = Self(10_023);
    pub const SSLCERT: Self = Self(10_025);
    /// Passphrase for both the client certificate and the private key.
    pub const KEYPASSWD: Self = Self(10_026);
    pub const SSLCERTPASSWD: Self = Self::KEYPASSWD;
    pub const SSLKEYPASSWD: Self = Self::KEYPASSWD;
    pub const CUSTOMREQUEST: Self = Self(10_036);
    pub const STDERR: Self = Self(10_037);
    pub const VERBOSE: Self = Self(41);
    pub const HEADER: Self = Self(42);
    pub const NOPROGRESS: Self = Self(43);
    pub const NOBODY: Self = Self(44);
    pub const UPLOAD: Self = Self(46);
    pub const PROGRESSFUNCTION: Self = Self(20_056);
    pub const SSL_VERIFYPEER: Self = Self(64);
    pub const CAINFO: Self = Self(10_065);
    pub const CONNECTTIMEOUT: Self = Self(78);
    pub const HEADERFUNCTION: Self = Self(20_079);
    pub const SSL_VERIFYHOST: Self = Self(81);
    pub const HTTP_VERSION: Self = Self(84);
    pub const SSLKEY: Self = Self(10_087);
    pub const ENCODING: Self = Self(10_102);
    pub const TIMEOUT_MS: Self = Self(155);
    pub const CONNECTTIMEOUT_MS: Self = Self(156);
    pub const PROTOCOLS: Self = Self(181);
    /// Adapter-level switch: never buffer the body into a return value.
    pub const RETURNTRANSFER: Self = Self(19_913);

    /// Option keys through which a body is read or written.
    pub const BODY_KEYS: [Self; 4] = [Self::WRITEFUNCTION, Self::READFUNCTION, Self::FILE, Self::INFILE];
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const PROTO_HTTP: i64 = 1;
pub const PROTO_HTTPS: i64 = 1 << 1;

/// Value stored under an option key.
pub enum OptionValue {
    Bool(bool),
    Long(i64),
    Text(String),
    Bytes(Bytes),
    List(Vec<String>),
    File(File),
    Reader(BodyReader),
    Writer(SharedStream),
    Progress(ProgressFn),
    /// Header lines go to the `HeaderSink` threaded alongside the options.
    HeaderSink,
    /// The process's standard error stream.
    Stderr,
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            OptionValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "Bool({b})"),
            OptionValue::Long(l) => write!(f, "Long({l})"),
            OptionValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            OptionValue::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            OptionValue::List(items) => f.debug_tuple("List").field(items).finish(),
            OptionValue::File(file) => f.debug_tuple("File").field(file).finish(),
            OptionValue::Reader(reader) => f.debug_tuple("Reader").field(reader).finish(),
            OptionValue::Writer(_) => f.write_str("Writer(..)"),
            OptionValue::Progress(_) => f.write_str("Progress(..)"),
            OptionValue::HeaderSink => f.write_str("HeaderSink"),
            OptionValue::Stderr => f.write_str("Stderr"),
        }
    }
}

/// Options for one transfer. Never shared between requests.
#[derive(Debug, Default)]
pub struct TransportOptions {
    entries: BTreeMap<OptionKey, OptionValue>,
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: OptionKey, value: OptionValue) -> Option<OptionValue> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.entries.get(&key)
    }

    pub fn get_mut(&mut self, key: OptionKey) -> Option<&mut OptionValue> {
        self.entries.get_mut(&key)
    }

    pub fn remove(&mut self, key: OptionKey) -> Option<OptionValue> {
        self.entries.remove(&key)
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Append one outgoing header line.
    pub fn push_header(&mut self, line: impl Into<String>) {
        match self.entries.get_mut(&OptionKey::HTTPHEADER) {
            Some(OptionValue::List(lines)) => lines.push(line.into()),
            _ => {
                self.entries
                    .insert(OptionKey::HTTPHEADER, OptionValue::List(vec![line.into()]));
            }
        }
    }

    /// Outgoing header lines in the order they were appended.
    pub fn header_lines(&self) -> &[String] {
        self.get(OptionKey::HTTPHEADER)
            .and_then(OptionValue::as_list)
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = OptionKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for TransportOptions {
    type Item = (OptionKey, OptionValue);
    type IntoIter = std::collections::btree_map::IntoIter<OptionKey, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
