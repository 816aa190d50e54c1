//! Test transport that answers requests from a canned source.
//!
//! # Design
//! The mock never builds options or touches the network. It resolves its
//! source, then honours the request's continuation exactly as the real
//! handler does: immediately for ready responses, lazily for deferred ones.
//! Future sources are shared so the same mock can serve many requests.

use std::fmt;
use std::sync::Arc;

use futures::future::Shared;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::future::{apply_continuation, Reply, ResponseFuture};
use crate::http::{Request, Response};

/// Function source: computes a reply from the request.
pub type MockFn = Arc<dyn Fn(&Request) -> Reply + Send + Sync>;

/// Where the mock's answer comes from.
#[derive(Clone)]
pub enum MockSource {
    Response(Response),
    Future(Shared<ResponseFuture>),
    Function(MockFn),
}

impl fmt::Debug for MockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockSource::Response(r) => f.debug_tuple("Response").field(r).finish(),
            MockSource::Future(_) => f.write_str("Future(..)"),
            MockSource::Function(_) => f.write_str("Function(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockTransport {
    source: MockSource,
}

impl MockTransport {
    pub fn new(source: MockSource) -> Self {
        Self { source }
    }

    pub fn with_response(response: Response) -> Self {
        Self::new(MockSource::Response(response))
    }

    pub fn with_future(future: ResponseFuture) -> Self {
        Self::new(MockSource::Future(future.shared()))
    }

    pub fn with_fn<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Reply + Send + Sync + 'static,
    {
        Self::new(MockSource::Function(Arc::new(f)))
    }

    /// Literal source from a partial JSON response, e.g. `{"status": 200}`.
    ///
    /// Missing fields take their empty defaults; present ones are kept.
    pub fn from_fixture(fixture: serde_json::Value) -> Result<Self, serde_json::Error> {
        let response: Response = serde_json::from_value(fixture)?;
        Ok(Self::with_response(response))
    }

    /// Answer `request`, applying its continuation if it has one.
    pub fn invoke(&self, mut request: Request) -> Reply {
        let then = request.then.take();
        debug!(
            method = %request.method,
            url = %request.url,
            continuation = then.is_some(),
            "mock transport invoked"
        );

        let reply = match &self.source {
            MockSource::Response(response) => Reply::Ready(rewound(response.clone())),
            MockSource::Future(shared) => Reply::Deferred(ResponseFuture::new(shared.clone().map(rewound))),
            MockSource::Function(f) => f(&request),
        };

        match (reply, then) {
            (reply, None) => reply,
            (Reply::Ready(response), Some(then)) => Reply::Ready(apply_continuation(response, then)),
            (Reply::Deferred(future), Some(then)) => Reply::Deferred(future.with_continuation(then)),
        }
    }
}

/// Body clones share one position, so each hand-out starts from the top.
fn rewound(response: Response) -> Response {
    if let Some(body) = &response.body {
        if let Err(e) = body.rewind() {
            warn!(error = %e, "could not rewind mock response body");
        }
    }
    response
}
