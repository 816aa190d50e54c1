//! Per-key handlers for client settings.
//!
//! # Design
//! Each client setting key maps to one independent handler in a
//! `HandlerRegistry`. A handler consumes the setting value, looks at the
//! request through a read-only `RequestContext`, and edits the option set.
//! Handlers do not depend on each other, so the order they run in does not
//! matter. New keys are added by registering another handler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::body::{shared_stream, LazyFile};
use crate::config::EngineCapabilities;
use crate::error::{BuildError, BuildResult};
use crate::http::Headers;
use crate::options::{OptionKey, OptionValue, TransportOptions};
use crate::settings::Setting;

/// Read-only view of the request being built.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub scheme: Option<&'a str>,
    /// Headers exactly as the caller supplied them.
    pub headers: &'a Headers,
    pub capabilities: EngineCapabilities,
}

pub type SettingHandler = fn(Setting, &RequestContext<'_>, &mut TransportOptions) -> BuildResult<()>;

/// Maps setting names to their handlers.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, SettingHandler>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `key`, returning the handler it replaces.
    pub fn register(&mut self, key: &'static str, handler: SettingHandler) -> Option<SettingHandler> {
        self.handlers.insert(key, handler)
    }

    pub fn get(&self, key: &str) -> Option<SettingHandler> {
        self.handlers.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.handlers.keys().copied().collect();
        keys.sort_unstable();
        f.debug_struct("HandlerRegistry").field("keys", &keys).finish()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("verify", verify);
        registry.register("decode_content", decode_content);
        registry.register("save_to", save_to);
        registry.register("timeout", timeout);
        registry.register("connect_timeout", connect_timeout);
        registry.register("proxy", proxy);
        registry.register("cert", cert);
        registry.register("ssl_key", ssl_key);
        registry.register("progress", progress);
        registry.register("debug", debug);
        registry
    }
}

fn invalid(key: &str, expected: &'static str) -> BuildError {
    BuildError::InvalidSetting {
        key: key.to_owned(),
        expected,
    }
}

pub fn verify(value: Setting, _ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    if let Setting::Bool(false) = value {
        options.remove(OptionKey::CAINFO);
        options.set(OptionKey::SSL_VERIFYHOST, OptionValue::Long(0));
        options.set(OptionKey::SSL_VERIFYPEER, OptionValue::Bool(false));
        return Ok(());
    }

    if let Setting::Text(path) = &value {
        if !Path::new(path).exists() {
            return Err(BuildError::CaBundleNotFound(PathBuf::from(path)));
        }
        options.set(OptionKey::CAINFO, OptionValue::Text(path.clone()));
    }
    options.set(OptionKey::SSL_VERIFYHOST, OptionValue::Long(2));
    options.set(OptionKey::SSL_VERIFYPEER, OptionValue::Bool(true));
    Ok(())
}

pub fn decode_content(value: Setting, ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    if let Setting::Bool(false) = value {
        options.remove(OptionKey::ENCODING);
        return Ok(());
    }

    match ctx.headers.first("Accept-Encoding") {
        Some(accept) => {
            options.set(OptionKey::ENCODING, OptionValue::Text(accept.to_owned()));
        }
        None => {
            // Empty encoding enables every decoder the engine has; the
            // header it would generate is suppressed.
            options.set(OptionKey::ENCODING, OptionValue::Text(String::new()));
            options.push_header("Accept-Encoding:");
        }
    }
    Ok(())
}

pub fn save_to(value: Setting, _ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    match value {
        Setting::Text(path) => {
            let path = PathBuf::from(path);
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !dir.is_dir() {
                return Err(BuildError::SaveToDirectoryMissing { dir, path });
            }
            let stream = shared_stream(LazyFile::new(path));
            options.set(OptionKey::WRITEFUNCTION, OptionValue::Writer(stream));
        }
        Setting::Stream(stream) => {
            options.set(OptionKey::WRITEFUNCTION, OptionValue::Writer(stream));
        }
        Setting::File(file) => {
            options.set(OptionKey::FILE, OptionValue::File(file));
        }
        other => return Err(BuildError::InvalidSaveTo(other.kind())),
    }
    Ok(())
}

fn seconds(key: &str, value: &Setting) -> BuildResult<f64> {
    value
        .as_number()
        .filter(|s| *s >= 0.0)
        .ok_or_else(|| invalid(key, "a non-negative number of seconds"))
}

fn set_timeout(
    options: &mut TransportOptions,
    caps: EngineCapabilities,
    secs: f64,
    ms_key: OptionKey,
    secs_key: OptionKey,
) {
    if caps.ms_timeouts {
        options.set(ms_key, OptionValue::Long((secs * 1000.0).round() as i64));
    } else {
        options.set(secs_key, OptionValue::Long(secs.ceil() as i64));
    }
}

pub fn timeout(value: Setting, ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    let secs = seconds("timeout", &value)?;
    set_timeout(options, ctx.capabilities, secs, OptionKey::TIMEOUT_MS, OptionKey::TIMEOUT);
    Ok(())
}

pub fn connect_timeout(value: Setting, ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    let secs = seconds("connect_timeout", &value)?;
    set_timeout(
        options,
        ctx.capabilities,
        secs,
        OptionKey::CONNECTTIMEOUT_MS,
        OptionKey::CONNECTTIMEOUT,
    );
    Ok(())
}

pub fn proxy(value: Setting, ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    match value {
        Setting::Text(url) => {
            options.set(OptionKey::PROXY, OptionValue::Text(url));
        }
        Setting::Map(mut by_scheme) => {
            let selected = ctx.scheme.and_then(|scheme| by_scheme.remove(scheme));
            match selected {
                Some(Setting::Text(url)) => {
                    options.set(OptionKey::PROXY, OptionValue::Text(url));
                }
                Some(_) => return Err(invalid("proxy", "proxy URLs as text")),
                None => {}
            }
        }
        _ => return Err(invalid("proxy", "a proxy URL or a map of scheme to proxy URL")),
    }
    Ok(())
}

/// Split a `path` or `[path, passphrase]` setting.
fn path_and_passphrase(key: &str, value: Setting) -> BuildResult<(PathBuf, Option<String>)> {
    match value {
        Setting::Text(path) => Ok((PathBuf::from(path), None)),
        Setting::List(items) => {
            let mut items = items.into_iter();
            match (items.next(), items.next(), items.next()) {
                (Some(Setting::Text(path)), Some(Setting::Text(pass)), None) => Ok((PathBuf::from(path), Some(pass))),
                _ => Err(invalid(key, "a path or a [path, passphrase] pair")),
            }
        }
        _ => Err(invalid(key, "a path or a [path, passphrase] pair")),
    }
}

pub fn cert(value: Setting, _ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    let (path, passphrase) = path_and_passphrase("cert", value)?;
    if !path.exists() {
        return Err(BuildError::CertificateNotFound(path));
    }
    if let Some(pass) = passphrase {
        options.set(OptionKey::SSLCERTPASSWD, OptionValue::Text(pass));
    }
    options.set(OptionKey::SSLCERT, OptionValue::Text(path.to_string_lossy().into_owned()));
    Ok(())
}

pub fn ssl_key(value: Setting, _ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    let (path, passphrase) = path_and_passphrase("ssl_key", value)?;
    if !path.exists() {
        return Err(BuildError::PrivateKeyNotFound(path));
    }
    if let Some(pass) = passphrase {
        options.set(OptionKey::SSLKEYPASSWD, OptionValue::Text(pass));
    }
    options.set(OptionKey::SSLKEY, OptionValue::Text(path.to_string_lossy().into_owned()));
    Ok(())
}

pub fn progress(value: Setting, _ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    let Setting::Progress(callback) = value else {
        return Err(BuildError::ProgressNotCallable);
    };
    options.set(OptionKey::NOPROGRESS, OptionValue::Bool(false));
    options.set(OptionKey::PROGRESSFUNCTION, OptionValue::Progress(callback));
    Ok(())
}

pub fn debug(value: Setting, _ctx: &RequestContext<'_>, options: &mut TransportOptions) -> BuildResult<()> {
    if !value.is_truthy() {
        return Ok(());
    }
    let target = match value {
        Setting::File(file) => OptionValue::File(file),
        Setting::Stream(stream) => OptionValue::Writer(stream),
        _ => OptionValue::Stderr,
    };
    options.set(OptionKey::STDERR, target);
    options.set(OptionKey::VERBOSE, OptionValue::Bool(true));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::settings::Settings;

    fn run(handler: SettingHandler, value: Setting) -> BuildResult<TransportOptions> {
        run_with(handler, value, &Headers::new(), Some("https"), EngineCapabilities::default())
    }

    fn run_with(
        handler: SettingHandler,
        value: Setting,
        headers: &Headers,
        scheme: Option<&str>,
        capabilities: EngineCapabilities,
    ) -> BuildResult<TransportOptions> {
        let ctx = RequestContext {
            method: "GET",
            url: "https://example.com/",
            scheme,
            headers,
            capabilities,
        };
        let mut options = TransportOptions::new();
        handler(value, &ctx, &mut options)?;
        Ok(options)
    }

    fn long(options: &TransportOptions, key: OptionKey) -> Option<i64> {
        options.get(key).and_then(OptionValue::as_long)
    }

    fn text(options: &TransportOptions, key: OptionKey) -> Option<&str> {
        options.get(key).and_then(OptionValue::as_text)
    }

    #[test]
    fn default_registry_knows_every_documented_key() {
        let registry = HandlerRegistry::default();
        for key in [
            "verify",
            "decode_content",
            "save_to",
            "timeout",
            "connect_timeout",
            "proxy",
            "cert",
            "ssl_key",
            "progress",
            "debug",
        ] {
            assert!(registry.contains(key), "missing handler for {key}");
        }
        assert!(!registry.contains("delay"));
    }

    #[test]
    fn verify_false_disables_checks_and_drops_ca_bundle() {
        let ctx_headers = Headers::new();
        let ctx = RequestContext {
            method: "GET",
            url: "https://example.com/",
            scheme: Some("https"),
            headers: &ctx_headers,
            capabilities: EngineCapabilities::default(),
        };
        let mut options = TransportOptions::new();
        options.set(OptionKey::CAINFO, OptionValue::Text("/etc/ca.pem".into()));
        verify(Setting::Bool(false), &ctx, &mut options).unwrap();
        assert!(!options.contains(OptionKey::CAINFO));
        assert_eq!(long(&options, OptionKey::SSL_VERIFYHOST), Some(0));
        assert_eq!(options.get(OptionKey::SSL_VERIFYPEER).and_then(OptionValue::as_bool), Some(false));
    }

    #[test]
    fn verify_path_sets_ca_bundle() {
        let bundle = tempfile::NamedTempFile::new().unwrap();
        let path = bundle.path().to_string_lossy().into_owned();
        let options = run(verify, Setting::Text(path.clone())).unwrap();
        assert_eq!(text(&options, OptionKey::CAINFO), Some(path.as_str()));
        assert_eq!(long(&options, OptionKey::SSL_VERIFYHOST), Some(2));
    }

    #[test]
    fn verify_missing_bundle_fails() {
        let err = run(verify, Setting::from("/definitely/not/here.pem")).unwrap_err();
        assert!(matches!(err, BuildError::CaBundleNotFound(_)));
    }

    #[test]
    fn verify_true_uses_engine_defaults() {
        let options = run(verify, Setting::Bool(true)).unwrap();
        assert!(!options.contains(OptionKey::CAINFO));
        assert_eq!(options.get(OptionKey::SSL_VERIFYPEER).and_then(OptionValue::as_bool), Some(true));
    }

    #[test]
    fn decode_content_without_header_suppresses_it() {
        let options = run(decode_content, Setting::Bool(true)).unwrap();
        assert_eq!(text(&options, OptionKey::ENCODING), Some(""));
        assert_eq!(options.header_lines(), ["Accept-Encoding:"]);
    }

    #[test]
    fn decode_content_uses_explicit_header() {
        let headers: Headers = [("Accept-Encoding", "gzip")].into_iter().collect();
        let options = run_with(
            decode_content,
            Setting::Bool(true),
            &headers,
            Some("https"),
            EngineCapabilities::default(),
        )
        .unwrap();
        assert_eq!(text(&options, OptionKey::ENCODING), Some("gzip"));
        assert!(options.header_lines().is_empty());
    }

    #[test]
    fn decode_content_false_sets_nothing() {
        let options = run(decode_content, Setting::Bool(false)).unwrap();
        assert!(options.is_empty());
    }

    #[test]
    fn save_to_path_requires_existing_directory() {
        let err = run(save_to, Setting::from("/no/such/dir/out.bin")).unwrap_err();
        assert!(matches!(err, BuildError::SaveToDirectoryMissing { .. }));
    }

    #[test]
    fn save_to_path_is_opened_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.bin");
        let options = run(save_to, Setting::from(path.as_path())).unwrap();
        assert!(matches!(options.get(OptionKey::WRITEFUNCTION), Some(OptionValue::Writer(_))));
        assert!(!path.exists());
    }

    #[test]
    fn save_to_stream_and_file() {
        let options = run(save_to, Setting::stream(Cursor::new(Vec::new()))).unwrap();
        assert!(matches!(options.get(OptionKey::WRITEFUNCTION), Some(OptionValue::Writer(_))));

        let options = run(save_to, Setting::File(tempfile::tempfile().unwrap())).unwrap();
        assert!(matches!(options.get(OptionKey::FILE), Some(OptionValue::File(_))));
    }

    #[test]
    fn save_to_rejects_other_shapes() {
        let err = run(save_to, Setting::Int(3)).unwrap_err();
        assert!(matches!(err, BuildError::InvalidSaveTo("int")));
    }

    #[test]
    fn timeouts_convert_seconds_to_milliseconds() {
        let options = run(timeout, Setting::Float(2.5)).unwrap();
        assert_eq!(long(&options, OptionKey::TIMEOUT_MS), Some(2500));

        let options = run(connect_timeout, Setting::Int(3)).unwrap();
        assert_eq!(long(&options, OptionKey::CONNECTTIMEOUT_MS), Some(3000));
    }

    #[test]
    fn timeouts_fall_back_to_seconds_without_ms_support() {
        let caps = EngineCapabilities {
            protocols: true,
            ms_timeouts: false,
        };
        let options = run_with(timeout, Setting::Float(1.2), &Headers::new(), None, caps).unwrap();
        assert_eq!(long(&options, OptionKey::TIMEOUT), Some(2));
        assert!(!options.contains(OptionKey::TIMEOUT_MS));
    }

    #[test]
    fn timeout_rejects_non_numbers() {
        let err = run(timeout, Setting::Bool(true)).unwrap_err();
        assert!(matches!(err, BuildError::InvalidSetting { .. }));
    }

    #[test]
    fn proxy_by_scheme_picks_request_scheme() {
        let map = Settings::new()
            .with("http", "http://proxy-a:3128")
            .with("https", "http://proxy-b:3128");
        let options = run(proxy, Setting::Map(map)).unwrap();
        assert_eq!(text(&options, OptionKey::PROXY), Some("http://proxy-b:3128"));
    }

    #[test]
    fn proxy_map_without_matching_scheme_sets_nothing() {
        let map = Settings::new().with("ftp", "http://proxy:3128");
        let options = run(proxy, Setting::Map(map)).unwrap();
        assert!(!options.contains(OptionKey::PROXY));
    }

    #[test]
    fn proxy_single_url() {
        let options = run(proxy, Setting::from("socks5://localhost:1080")).unwrap();
        assert_eq!(text(&options, OptionKey::PROXY), Some("socks5://localhost:1080"));
    }

    #[test]
    fn cert_with_passphrase() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let options = run(cert, Setting::from(vec![path.clone(), "hunter2".to_string()])).unwrap();
        assert_eq!(text(&options, OptionKey::SSLCERT), Some(path.as_str()));
        assert_eq!(text(&options, OptionKey::SSLCERTPASSWD), Some("hunter2"));
    }

    #[test]
    fn missing_cert_and_key_fail() {
        let err = run(cert, Setting::from("/missing/cert.pem")).unwrap_err();
        assert!(matches!(err, BuildError::CertificateNotFound(_)));
        let err = run(ssl_key, Setting::from(vec!["/missing/key.pem", "pw"])).unwrap_err();
        assert!(matches!(err, BuildError::PrivateKeyNotFound(_)));
    }

    #[test]
    fn ssl_key_without_passphrase() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = run(ssl_key, Setting::from(file.path())).unwrap();
        assert!(options.contains(OptionKey::SSLKEY));
        assert!(!options.contains(OptionKey::SSLKEYPASSWD));
    }

    #[test]
    fn progress_must_be_callable() {
        let err = run(progress, Setting::from("not a function")).unwrap_err();
        assert!(matches!(err, BuildError::ProgressNotCallable));

        let options = run(progress, Setting::progress(|_, _, _, _| {})).unwrap();
        assert_eq!(options.get(OptionKey::NOPROGRESS).and_then(OptionValue::as_bool), Some(false));
        assert!(matches!(options.get(OptionKey::PROGRESSFUNCTION), Some(OptionValue::Progress(_))));
    }

    #[test]
    fn debug_defaults_to_stderr() {
        let options = run(debug, Setting::Bool(true)).unwrap();
        assert!(matches!(options.get(OptionKey::STDERR), Some(OptionValue::Stderr)));
        assert_eq!(options.get(OptionKey::VERBOSE).and_then(OptionValue::as_bool), Some(true));
    }

    #[test]
    fn debug_stream_target_and_falsy_value() {
        let options = run(debug, Setting::stream(Cursor::new(Vec::new()))).unwrap();
        assert!(matches!(options.get(OptionKey::STDERR), Some(OptionValue::Writer(_))));

        let options = run(debug, Setting::Bool(false)).unwrap();
        assert!(options.is_empty());
    }
}
