//! Translation of a `Request` into engine options.
//!
//! # Design
//! `OptionBuilder` is stateless apart from its configuration and handler
//! registry. `build` consumes a request and returns a `PreparedTransfer`:
//! the option set, an empty `HeaderSink` for the engine to fill, and the
//! body handle the response will be read from. The caller runs the engine
//! between `build` and `normalize::normalize`, keeping the builder free of
//! any I/O beyond opening the default body store.
//!
//! Steps run in a fixed order: defaults, method, body policy, header
//! flattening, client-setting handlers, raw engine overrides, output
//! destination.

use tracing::{debug, trace};

use crate::body::{RequestBody, ResponseBody};
use crate::config::BuilderConfig;
use crate::error::{BuildError, BuildResult};
use crate::handlers::{HandlerRegistry, RequestContext, SettingHandler};
use crate::http::{Headers, HttpVersion, Request};
use crate::normalize::HeaderSink;
use crate::options::{OptionKey, OptionValue, TransportOptions, PROTO_HTTP, PROTO_HTTPS};
use crate::settings::{Setting, SettingKey, Settings};
use crate::stream::{self, UploadSource};

/// Client setting holding engine-specific entries: integer-keyed raw option
/// overrides plus engine policy flags such as `body_as_string`.
pub const ENGINE_SETTINGS_KEY: &str = "curl";

/// Everything the engine needs for one transfer.
#[derive(Debug)]
pub struct PreparedTransfer {
    pub options: TransportOptions,
    /// Filled by the engine, read by the normalizer.
    pub headers: HeaderSink,
    /// Where response bytes land; `None` for HEAD.
    pub destination: Option<ResponseBody>,
}

#[derive(Debug, Clone, Default)]
pub struct OptionBuilder {
    config: BuilderConfig,
    handlers: HandlerRegistry,
}

impl OptionBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::default(),
        }
    }

    /// Register or replace the handler for a client setting key.
    pub fn with_handler(mut self, key: &'static str, handler: SettingHandler) -> Self {
        self.handlers.register(key, handler);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build engine options for `request`.
    ///
    /// The request's continuation, if any, is dropped; callers that honour
    /// it take it out first.
    pub fn build(&self, request: Request) -> BuildResult<PreparedTransfer> {
        let scheme = request.scheme();
        let Request {
            method,
            url,
            version,
            headers,
            body,
            client,
            ..
        } = request;

        let mut client = client;
        let engine_settings = match client.as_mut().and_then(|c| c.remove(ENGINE_SETTINGS_KEY)) {
            None => Settings::new(),
            Some(Setting::Map(map)) => map,
            Some(_) => {
                return Err(BuildError::InvalidSetting {
                    key: ENGINE_SETTINGS_KEY.to_owned(),
                    expected: "a map of engine options",
                })
            }
        };
        let body_as_string = engine_settings
            .get("body_as_string")
            .is_some_and(Setting::is_truthy);

        let is_head = method.eq_ignore_ascii_case("HEAD");
        let mut options = self.default_options(&url, version);
        let mut outgoing = headers.clone();

        if is_head {
            strip_body_options(&mut options);
            options.set(OptionKey::NOBODY, OptionValue::Bool(true));
        } else {
            options.set(OptionKey::CUSTOMREQUEST, OptionValue::Text(method.clone()));
            match body {
                Some(body) => self.apply_body(body, &headers, &mut outgoing, body_as_string, &mut options)?,
                None => {
                    let needs_length = method.eq_ignore_ascii_case("POST") || method.eq_ignore_ascii_case("PUT");
                    if needs_length && !headers.contains("Content-Length") {
                        options.push_header("Content-Length: 0");
                    }
                }
            }
        }

        apply_headers(&outgoing, &headers, &mut options);

        if let Some(client) = client {
            let ctx = RequestContext {
                method: &method,
                url: &url,
                scheme: scheme.as_deref(),
                headers: &headers,
                capabilities: self.config.capabilities,
            };
            self.apply_settings(client, &ctx, &mut options)?;
        }

        if is_head {
            strip_body_options(&mut options);
        }

        apply_raw_overrides(engine_settings, &mut options)?;

        let destination = if is_head {
            None
        } else {
            Some(output_destination(&mut options)?)
        };

        debug!(
            method = %method,
            url = %url,
            options = options.len(),
            header_lines = options.header_lines().len(),
            "built transport options"
        );

        Ok(PreparedTransfer {
            options,
            headers: HeaderSink::new(),
            destination,
        })
    }

    fn default_options(&self, url: &str, version: Option<HttpVersion>) -> TransportOptions {
        let mut options = TransportOptions::new();
        options.set(OptionKey::URL, OptionValue::Text(url.to_owned()));
        options.set(OptionKey::RETURNTRANSFER, OptionValue::Bool(false));
        options.set(OptionKey::HEADER, OptionValue::Bool(false));
        options.set(OptionKey::HEADERFUNCTION, OptionValue::HeaderSink);

        let caps = self.config.capabilities;
        if caps.ms_timeouts {
            options.set(OptionKey::CONNECTTIMEOUT_MS, OptionValue::Long(self.config.connect_timeout_ms));
        } else {
            let secs = (self.config.connect_timeout_ms + 999) / 1000;
            options.set(OptionKey::CONNECTTIMEOUT, OptionValue::Long(secs));
        }
        if caps.protocols {
            options.set(OptionKey::PROTOCOLS, OptionValue::Long(PROTO_HTTP | PROTO_HTTPS));
        }
        if let Some(version) = version {
            options.set(OptionKey::HTTP_VERSION, OptionValue::Long(version.engine_code()));
        }
        options
    }

    fn apply_body(
        &self,
        body: RequestBody,
        headers: &Headers,
        outgoing: &mut Headers,
        body_as_string: bool,
        options: &mut TransportOptions,
    ) -> BuildResult<()> {
        let declared = headers
            .first("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok());
        let small = declared.is_some_and(|len| len < self.config.string_body_threshold);

        if small || body_as_string || body.is_string() {
            let bytes = body.into_bytes()?;
            trace!(len = bytes.len(), "sending body as in-memory field");
            options.set(OptionKey::POSTFIELDS, OptionValue::Bytes(bytes));
            outgoing.remove("Content-Length");
            outgoing.remove("Transfer-Encoding");
        } else {
            let source = stream::bridge(body)?;
            options.set(OptionKey::UPLOAD, OptionValue::Bool(true));
            outgoing.remove("Content-Length");
            if let Some(size) = declared.or_else(|| source.size()) {
                options.set(OptionKey::INFILESIZE, OptionValue::Long(size as i64));
            }
            trace!(size = ?declared, "streaming request body");
            match source {
                UploadSource::Reader { reader, .. } => {
                    options.set(OptionKey::READFUNCTION, OptionValue::Reader(reader));
                }
                UploadSource::File { file, .. } => {
                    options.set(OptionKey::INFILE, OptionValue::File(file));
                }
            }
        }

        if !headers.contains("Expect") {
            options.push_header("Expect:");
        }
        if !headers.contains("Content-Type") {
            options.push_header("Content-Type:");
        }
        Ok(())
    }

    fn apply_settings(&self, client: Settings, ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
        for (key, value) in client {
            let SettingKey::Name(name) = key else {
                trace!(key = %key, "ignoring coded top-level client setting");
                continue;
            };
            match self.handlers.get(&name) {
                Some(handler) => handler(value, ctx, options)?,
                None => trace!(key = %name, "no handler for client setting"),
            }
        }
        Ok(())
    }
}

fn strip_body_options(options: &mut TransportOptions) {
    for key in OptionKey::BODY_KEYS {
        options.remove(key);
    }
}

/// Flatten headers into `Name: value` lines, one per value.
fn apply_headers(outgoing: &Headers, original: &Headers, options: &mut TransportOptions) {
    for (name, values) in outgoing.iter() {
        for value in values {
            options.push_header(format!("{name}: {value}"));
        }
    }
    if !original.contains("Accept") {
        options.push_header("Accept:");
    }
}

fn apply_raw_overrides(engine: Settings, options: &mut TransportOptions) -> BuildResult<()> {
    for (key, value) in engine {
        if let SettingKey::Code(code) = key {
            let value = option_value(code, value)?;
            trace!(code, "raw engine option override");
            options.set(OptionKey(code), value);
        }
    }
    Ok(())
}

fn option_value(code: u32, setting: Setting) -> BuildResult<OptionValue> {
    let invalid = || BuildError::InvalidSetting {
        key: format!("{ENGINE_SETTINGS_KEY}.{code}"),
        expected: "a scalar, a list of text, a file, a stream or a callback",
    };
    Ok(match setting {
        Setting::Bool(b) => OptionValue::Bool(b),
        Setting::Int(i) => OptionValue::Long(i),
        Setting::Float(f) => OptionValue::Long(f as i64),
        Setting::Text(s) => OptionValue::Text(s),
        Setting::List(items) => {
            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Setting::Text(s) => lines.push(s),
                    Setting::Int(i) => lines.push(i.to_string()),
                    _ => return Err(invalid()),
                }
            }
            OptionValue::List(lines)
        }
        Setting::File(file) => OptionValue::File(file),
        Setting::Stream(stream) => OptionValue::Writer(stream),
        Setting::Progress(callback) => OptionValue::Progress(callback),
        Setting::Map(_) => return Err(invalid()),
    })
}

/// Pick where the response body goes, opening a temp store when needed.
fn output_destination(options: &mut TransportOptions) -> BuildResult<ResponseBody> {
    if let Some(OptionValue::Writer(stream)) = options.get(OptionKey::WRITEFUNCTION) {
        return Ok(ResponseBody::from_shared(stream.clone()));
    }
    if let Some(OptionValue::File(file)) = options.get(OptionKey::FILE) {
        return Ok(ResponseBody::from_file(file.try_clone()?));
    }
    let store = tempfile::tempfile()?;
    let body = ResponseBody::from_file(store.try_clone()?);
    options.set(OptionKey::FILE, OptionValue::File(store));
    Ok(body)
}
