//! Deferred responses.
//!
//! # Design
//! A `ResponseFuture` is lazy: nothing runs until it is polled or waited on.
//! Attaching a continuation wraps the future in a new one rather than
//! resolving it, so chaining never forces evaluation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::http::{Continuation, Response};

/// A response that will be produced later.
pub struct ResponseFuture {
    inner: BoxFuture<'static, Response>,
}

impl ResponseFuture {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Response> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// Run `thunk` on first poll.
    pub fn from_thunk<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Response + Send + 'static,
    {
        Self::new(futures::future::lazy(move |_| thunk()))
    }

    pub fn ready(response: Response) -> Self {
        Self::new(futures::future::ready(response))
    }

    /// Block the current thread until the response is available.
    pub fn wait(self) -> Response {
        futures::executor::block_on(self)
    }

    /// A new lazy future that applies `then` once this one resolves.
    pub fn with_continuation(self, then: Continuation) -> Self {
        Self::new(async move {
            let response = self.await;
            apply_continuation(response, then)
        })
    }
}

impl Future for ResponseFuture {
    type Output = Response;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseFuture(..)")
    }
}

/// Result of a transport call: available now or later.
#[derive(Debug)]
pub enum Reply {
    Ready(Response),
    Deferred(ResponseFuture),
}

impl Reply {
    /// Resolve the reply, blocking if it is deferred.
    pub fn wait(self) -> Response {
        match self {
            Reply::Ready(response) => response,
            Reply::Deferred(future) => future.wait(),
        }
    }

    pub fn into_future(self) -> ResponseFuture {
        match self {
            Reply::Ready(response) => ResponseFuture::ready(response),
            Reply::Deferred(future) => future,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Reply::Deferred(_))
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Ready(response)
    }
}

impl From<ResponseFuture> for Reply {
    fn from(future: ResponseFuture) -> Self {
        Reply::Deferred(future)
    }
}

/// Apply `then`: a returned response replaces the original, `None` keeps
/// the original including any edits made through the reference.
pub fn apply_continuation(mut response: Response, then: Continuation) -> Response {
    match then(&mut response) {
        Some(replacement) => replacement,
        None => response,
    }
}
