//! Transfer adapter core: turns engine-independent requests into engine
//! options and engine output back into responses.
//!
//! # Overview
//! A `Request` goes through `OptionBuilder::build`, producing an option set
//! keyed by the engine's integer option codes plus a `HeaderSink` and a body
//! destination. A `TransferEngine` performs the transfer; `normalize` turns
//! what it reports into a `Response`. `MockTransport` answers requests from
//! canned sources with the same continuation semantics, for tests.
//!
//! # Design
//! - The core never opens sockets; an engine does the I/O behind a trait.
//! - Option-building failures are returned as `BuildError` before anything is
//!   sent. Transfer failures travel inside `Response::error`.
//! - Every `Response` carries all of its fields, defaulted when absent.

pub mod body;
pub mod builder;
pub mod config;
pub mod error;
pub mod future;
pub mod handler;
pub mod handlers;
pub mod http;
pub mod mock;
pub mod normalize;
pub mod options;
pub mod settings;
pub mod stream;

pub use body::{RequestBody, ResponseBody};
pub use builder::{OptionBuilder, PreparedTransfer};
pub use config::BuilderConfig;
pub use error::{BuildError, BuildResult, TransferError, TransferErrorKind};
pub use future::{Reply, ResponseFuture};
pub use handler::{TransferEngine, TransferHandler};
pub use http::{Headers, HttpVersion, Request, Response, TransferStats};
pub use mock::{MockSource, MockTransport};
pub use normalize::{normalize, HeaderSink, RawTransfer};
pub use options::{OptionKey, OptionValue, TransportOptions};
pub use settings::{Setting, Settings};
