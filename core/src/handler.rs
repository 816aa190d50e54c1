//! Real transfer path: build, perform, normalize.
//!
//! # Design
//! The engine sits behind `TransferEngine` so the adapter itself never links
//! a network library. An engine consumes the option set, feeds header lines
//! into the supplied `HeaderSink`, writes body bytes to the destination named
//! by `FILE` or `WRITEFUNCTION`, and reports its outcome as a `RawTransfer`.

use std::thread;

use tracing::{debug, debug_span};
use uuid::Uuid;

use crate::builder::OptionBuilder;
use crate::error::BuildResult;
use crate::future::apply_continuation;
use crate::http::{Request, Response};
use crate::normalize::{normalize, HeaderSink, RawTransfer};
use crate::options::TransportOptions;

/// A transport capable of executing one prepared transfer.
pub trait TransferEngine {
    fn perform(&mut self, options: TransportOptions, headers: &mut HeaderSink) -> RawTransfer;
}

#[derive(Debug)]
pub struct TransferHandler<E> {
    engine: E,
    builder: OptionBuilder,
}

impl<E: TransferEngine> TransferHandler<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            builder: OptionBuilder::default(),
        }
    }

    pub fn with_builder(engine: E, builder: OptionBuilder) -> Self {
        Self { engine, builder }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Execute `request`.
    ///
    /// Option-building failures return `Err` before anything is sent.
    /// Transfer failures come back as a response with `error` set.
    pub fn handle(&mut self, mut request: Request) -> BuildResult<Response> {
        let id = Uuid::new_v4();
        let span = debug_span!("transfer", %id, method = %request.method, url = %request.url);
        let _guard = span.enter();

        let then = request.then.take();
        if let Some(delay) = request.delay() {
            debug!(?delay, "delaying transfer");
            thread::sleep(delay);
        }

        let mut prepared = self.builder.build(request)?;
        let raw = self.engine.perform(prepared.options, &mut prepared.headers);
        let response = normalize(raw, prepared.headers, prepared.destination);
        debug!(status = ?response.status, error = response.is_error(), "transfer complete");

        Ok(match then {
            Some(then) => apply_continuation(response, then),
            None => response,
        })
    }
}
