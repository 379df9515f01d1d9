// Tower layer and service wrapping the inner handler
// Starts the clock, resolves the route and sizes the request on entry, then
// hands the response body to a CountingBody that records on completion.

use super::body::{CountingBody, Recorder};
use super::observation::Observation;
use super::route::{MatchedPathResolver, RouteResolver};
use crate::metrics::HttpMetrics;
use http::{Request, Response};
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Layer that instruments every request with [`HttpMetrics`].
#[derive(Clone)]
pub struct MetricsLayer<R = MatchedPathResolver> {
    metrics: HttpMetrics,
    resolver: R,
}

impl MetricsLayer {
    pub fn new(metrics: HttpMetrics) -> Self {
        Self::with_resolver(metrics, MatchedPathResolver)
    }
}

impl<R> MetricsLayer<R> {
    pub fn with_resolver(metrics: HttpMetrics, resolver: R) -> Self {
        Self { metrics, resolver }
    }
}

impl<S, R: Clone> Layer<S> for MetricsLayer<R> {
    type Service = MetricsService<S, R>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: self.metrics.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

/// Service produced by [`MetricsLayer`]. Responses are passed through
/// unchanged apart from the body wrapper.
#[derive(Clone)]
pub struct MetricsService<S, R = MatchedPathResolver> {
    inner: S,
    metrics: HttpMetrics,
    resolver: R,
}

impl<S, R, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S, R>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    R: RouteResolver,
    ResBody: Body,
{
    type Response = Response<CountingBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let path = self.resolver.resolve(&req);
        let observation = Observation::new(start, &req, path);

        ResponseFuture {
            inner: self.inner.call(req),
            metrics: self.metrics.clone(),
            observation: Some(observation),
        }
    }
}

pin_project! {
    /// Response future for [`MetricsService`].
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        metrics: HttpMetrics,
        observation: Option<Observation>,
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
{
    type Output = Result<Response<CountingBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        // an inner error leaves the observation unrecorded
        let res = ready!(this.inner.poll(cx))?;

        let mut observation = this.observation.take();
        if let Some(observation) = observation.as_mut() {
            observation.write_header(res.status());
        }
        let recorder = Recorder::new(this.metrics.clone(), observation);

        Poll::Ready(Ok(res.map(|body| CountingBody::new(body, recorder))))
    }
}
