//! Verify option building and response normalization against JSON test
//! vectors stored in `test-vectors/`.
//!
//! Each vector file lists inputs and the expected result. Options are
//! compared by engine option code so a vector states only the entries it
//! cares about, plus the codes that must be absent.

use serde_json::Value;
use transfer_core::{
    normalize, HeaderSink, HttpVersion, OptionBuilder, OptionKey, OptionValue, RawTransfer, Request, ResponseBody,
    Setting, Settings, TransferErrorKind,
};

/// Convert a JSON value into a client setting.
fn setting(value: &Value) -> Setting {
    match value {
        Value::Bool(b) => Setting::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Setting::Int(i),
            None => Setting::Float(n.as_f64().unwrap()),
        },
        Value::String(s) => Setting::Text(s.clone()),
        Value::Array(items) => Setting::List(items.iter().map(setting).collect()),
        Value::Object(_) => Setting::Map(settings(value, false)),
        Value::Null => panic!("null is not a setting value"),
    }
}

/// Convert a JSON object into settings. Numeric keys become engine option
/// codes when `coded` is set, as they are under `curl`.
fn settings(value: &Value, coded: bool) -> Settings {
    let mut out = Settings::new();
    for (key, value) in value.as_object().unwrap() {
        let value = if key == "curl" {
            Setting::Map(settings(value, true))
        } else {
            setting(value)
        };
        match key.parse::<u32>() {
            Ok(code) if coded => out.insert(code, value),
            _ => out.insert(key.as_str(), value),
        };
    }
    out
}

fn parse_version(s: &str) -> HttpVersion {
    match s {
        "1.0" => HttpVersion::Http10,
        "1.1" => HttpVersion::Http11,
        "2" => HttpVersion::Http2,
        other => panic!("unknown version: {other}"),
    }
}

fn request(case: &Value) -> Request {
    let spec = &case["request"];
    let mut request = Request::new(spec["method"].as_str().unwrap(), spec["url"].as_str().unwrap());
    for pair in spec["headers"].as_array().unwrap() {
        request = request.with_header(pair[0].as_str().unwrap(), pair[1].as_str().unwrap());
    }
    if let Some(body) = spec["body"].as_str() {
        request = request.with_body(body);
    }
    if let Some(version) = spec["version"].as_str() {
        request = request.with_version(parse_version(version));
    }
    if !spec["settings"].is_null() {
        request.client = Some(settings(&spec["settings"], false));
    }
    request
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[test]
fn option_test_vectors() {
    let raw = include_str!("../../test-vectors/options.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let builder = OptionBuilder::default();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];
        let prepared = builder.build(request(case)).unwrap_or_else(|e| panic!("{name}: {e}"));
        let options = &prepared.options;

        for (code, want) in expected["options"].as_object().unwrap() {
            let key = OptionKey(code.parse().unwrap());
            let got = options
                .get(key)
                .unwrap_or_else(|| panic!("{name}: option {code} missing"));
            match (want, got) {
                (Value::Bool(b), got) => assert_eq!(got.as_bool(), Some(*b), "{name}: option {code}"),
                (Value::Number(n), got) => assert_eq!(got.as_long(), n.as_i64(), "{name}: option {code}"),
                (Value::String(s), OptionValue::Text(t)) => assert_eq!(t, s, "{name}: option {code}"),
                (Value::String(s), OptionValue::Bytes(b)) => assert_eq!(b, s.as_bytes(), "{name}: option {code}"),
                (want, got) => panic!("{name}: option {code}: expected {want}, got {got:?}"),
            }
        }

        for code in expected["absent"].as_array().unwrap() {
            let key = OptionKey(code.as_u64().unwrap() as u32);
            assert!(!options.contains(key), "{name}: option {key} should be absent");
        }

        let lines: Vec<&str> = expected["header_lines"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l.as_str().unwrap())
            .collect();
        assert_eq!(options.header_lines(), lines.as_slice(), "{name}: header lines");
    }
}

// ---------------------------------------------------------------------------
// Normalize
// ---------------------------------------------------------------------------

#[test]
fn normalize_test_vectors() {
    let raw = include_str!("../../test-vectors/normalize.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];

        let mut sink = HeaderSink::new();
        for line in case["header_lines"].as_array().unwrap() {
            sink.push_raw(&format!("{}\r\n", line.as_str().unwrap()));
        }
        let transfer: RawTransfer = serde_json::from_value(case["raw"].clone()).unwrap();
        let body = case["body"]
            .as_str()
            .map(|b| ResponseBody::from_bytes(b.as_bytes().to_vec()));

        let response = normalize(transfer, sink, body);

        assert_eq!(response.status.map(u64::from), expected["status"].as_u64(), "{name}: status");
        assert_eq!(response.reason.as_deref(), expected["reason"].as_str(), "{name}: reason");
        assert_eq!(response.version.as_deref(), expected["version"].as_str(), "{name}: version");
        assert_eq!(
            response.effective_url.as_deref(),
            expected["effective_url"].as_str(),
            "{name}: effective_url"
        );
        assert_eq!(
            serde_json::to_value(&response.headers).unwrap(),
            expected["headers"],
            "{name}: headers"
        );

        let body = response.body.as_ref().map(|b| b.read_to_string().unwrap());
        assert_eq!(body.as_deref(), expected["body"].as_str(), "{name}: body");

        match (&response.error, &expected["error"]) {
            (None, Value::Null) => {}
            (Some(error), want) => {
                let kind = match error.kind {
                    TransferErrorKind::Connect => "connect",
                    TransferErrorKind::Transfer => "transfer",
                };
                assert_eq!(kind, want["kind"], "{name}: error kind");
                assert_eq!(i64::from(error.code), want["code"].as_i64().unwrap(), "{name}: error code");
                assert_eq!(error.message, want["message"], "{name}: error message");
            }
            (None, want) => panic!("{name}: expected error {want}"),
        }
    }
}
