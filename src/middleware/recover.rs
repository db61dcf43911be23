//! Outermost guard of the pipeline.
//!
//! Wraps `tower_http::catch_panic`: a panic anywhere below turns into a plain
//! 500 envelope with `Connection: close`, and the listener keeps accepting.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, Response},
    response::IntoResponse,
};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

use crate::error::{panic_message, AppError};
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct PanicResponder {
    metrics: Metrics,
}

impl PanicResponder {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        self.metrics.inc_panics();
        let message = panic_message(err.as_ref());
        tracing::error!("recovered from panic in request handler: {}", message);

        let mut response = AppError::Internal(anyhow::anyhow!("panic: {}", message)).into_response();
        response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

pub fn layer(metrics: Metrics) -> CatchPanicLayer<PanicResponder> {
    CatchPanicLayer::custom(PanicResponder::new(metrics))
}
