//! Client-level settings attached to a request.
//!
//! Settings form an open mapping: keys are either names (`"verify"`,
//! `"timeout"`, ...) or integer engine-option codes, and values are
//! dynamically typed so that one map can carry flags, paths, streams and
//! callbacks alike.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::sync::Arc;

use crate::body::{shared_stream, BodyStream, SharedStream};
use crate::options::OptionKey;

/// Progress callback: `(download_total, downloaded, upload_total, uploaded)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64, u64, u64) + Send + Sync>;

/// Key of a client setting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    Name(String),
    /// Raw engine option code.
    Code(u32),
}

impl From<&str> for SettingKey {
    fn from(name: &str) -> Self {
        SettingKey::Name(name.to_owned())
    }
}

impl From<String> for SettingKey {
    fn from(name: String) -> Self {
        SettingKey::Name(name)
    }
}

impl From<u32> for SettingKey {
    fn from(code: u32) -> Self {
        SettingKey::Code(code)
    }
}

impl From<OptionKey> for SettingKey {
    fn from(key: OptionKey) -> Self {
        SettingKey::Code(key.0)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKey::Name(name) => f.write_str(name),
            SettingKey::Code(code) => write!(f, "{code}"),
        }
    }
}

/// A dynamically typed setting value.
pub enum Setting {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Setting>),
    Map(Settings),
    File(File),
    Stream(SharedStream),
    Progress(ProgressFn),
}

impl Setting {
    pub fn stream<S: BodyStream + 'static>(stream: S) -> Self {
        Setting::Stream(shared_stream(stream))
    }

    pub fn progress<F>(f: F) -> Self
    where
        F: Fn(u64, u64, u64, u64) + Send + Sync + 'static,
    {
        Setting::Progress(Arc::new(f))
    }

    /// Loose truthiness used by flag-like settings.
    pub fn is_truthy(&self) -> bool {
        match self {
            Setting::Bool(b) => *b,
            Setting::Int(i) => *i != 0,
            Setting::Float(f) => *f != 0.0,
            Setting::Text(s) => !s.is_empty() && s != "0",
            Setting::List(items) => !items.is_empty(),
            Setting::Map(map) => !map.is_empty(),
            Setting::File(_) | Setting::Stream(_) | Setting::Progress(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Setting::Int(i) => Some(*i as f64),
            Setting::Float(f) => Some(*f),
            Setting::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Setting::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Setting::Bool(_) => "bool",
            Setting::Int(_) => "int",
            Setting::Float(_) => "float",
            Setting::Text(_) => "text",
            Setting::List(_) => "list",
            Setting::Map(_) => "map",
            Setting::File(_) => "file",
            Setting::Stream(_) => "stream",
            Setting::Progress(_) => "callback",
        }
    }
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Bool(b) => write!(f, "Bool({b})"),
            Setting::Int(i) => write!(f, "Int({i})"),
            Setting::Float(x) => write!(f, "Float({x})"),
            Setting::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Setting::List(items) => f.debug_tuple("List").field(items).finish(),
            Setting::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Setting::File(file) => f.debug_tuple("File").field(file).finish(),
            Setting::Stream(_) => f.write_str("Stream(..)"),
            Setting::Progress(_) => f.write_str("Progress(..)"),
        }
    }
}

impl From<bool> for Setting {
    fn from(b: bool) -> Self {
        Setting::Bool(b)
    }
}

impl From<i64> for Setting {
    fn from(i: i64) -> Self {
        Setting::Int(i)
    }
}

impl From<i32> for Setting {
    fn from(i: i32) -> Self {
        Setting::Int(i64::from(i))
    }
}

impl From<f64> for Setting {
    fn from(f: f64) -> Self {
        Setting::Float(f)
    }
}

impl From<&str> for Setting {
    fn from(s: &str) -> Self {
        Setting::Text(s.to_owned())
    }
}

impl From<String> for Setting {
    fn from(s: String) -> Self {
        Setting::Text(s)
    }
}

impl From<&std::path::Path> for Setting {
    fn from(path: &std::path::Path) -> Self {
        Setting::Text(path.to_string_lossy().into_owned())
    }
}

impl From<File> for Setting {
    fn from(file: File) -> Self {
        Setting::File(file)
    }
}

impl From<Settings> for Setting {
    fn from(map: Settings) -> Self {
        Setting::Map(map)
    }
}

impl<T: Into<Setting>> From<Vec<T>> for Setting {
    fn from(items: Vec<T>) -> Self {
        Setting::List(items.into_iter().map(Into::into).collect())
    }
}

/// Open mapping of client settings.
#[derive(Debug, Default)]
pub struct Settings {
    entries: BTreeMap<SettingKey, Setting>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<SettingKey>, value: impl Into<Setting>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<SettingKey>, value: impl Into<Setting>) -> Option<Setting> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.entries.get(&SettingKey::Name(name.to_owned()))
    }

    pub fn remove(&mut self, name: &str) -> Option<Setting> {
        self.entries.remove(&SettingKey::Name(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SettingKey, &Setting)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Settings {
    type Item = (SettingKey, Setting);
    type IntoIter = std::collections::btree_map::IntoIter<SettingKey, Setting>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
