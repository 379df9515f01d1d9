// Per-request observation context
// Tracks start time, final status and bytes written for one request, plus the
// label and request-size helpers computed from the request head.

use crate::metrics::{HttpMetrics, Labels, Sample};
use http::{header, HeaderMap, Request, StatusCode, Version};
use std::time::Instant;
use tracing::trace;

/// State owned by exactly one in-flight request.
#[derive(Debug)]
pub(crate) struct Observation {
    start: Instant,
    status: Option<StatusCode>,
    written: u64,
    method: String,
    path: String,
    request_size: u64,
}

impl Observation {
    pub(crate) fn new<B>(start: Instant, req: &Request<B>, path: Option<String>) -> Self {
        Self {
            start,
            status: None,
            written: 0,
            method: sanitize_method(req.method()),
            path: path.unwrap_or_default(),
            request_size: approximate_request_size(req),
        }
    }

    /// First explicit status wins; later calls are ignored.
    pub(crate) fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    /// Account for `n` body bytes. A write before any header implies 200 OK.
    pub(crate) fn write(&mut self, n: u64) {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.written += n;
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn labels(&self) -> Labels {
        Labels {
            code: sanitize_code(self.status()),
            method: self.method.clone(),
            path: self.path.clone(),
        }
    }

    pub(crate) fn record(self, metrics: &HttpMetrics) {
        let labels = self.labels();
        let sample = Sample {
            elapsed: self.start.elapsed(),
            request_size: self.request_size,
            response_size: self.written(),
        };
        metrics.record(&labels, &sample);
        trace!(
            code = %labels.code,
            method = %labels.method,
            path = %labels.path,
            elapsed_s = sample.elapsed.as_secs_f64(),
            response_size = sample.response_size,
            "http metrics recorded"
        );
    }
}

pub fn sanitize_method(method: &http::Method) -> String {
    method.as_str().to_lowercase()
}

pub fn sanitize_code(status: StatusCode) -> String {
    status.as_u16().to_string()
}

/// Rough size of the request head plus the declared body length.
///
/// Sums path, method, protocol, header names and values, host, and
/// `Content-Length` when it is present and parseable. The `Host` header is
/// counted once, as the host.
pub fn approximate_request_size<B>(req: &Request<B>) -> u64 {
    let headers = req.headers();
    let mut s = req.uri().path().len() as u64;

    s += req.method().as_str().len() as u64;
    s += protocol(req.version()).len() as u64;
    for name in headers.keys() {
        if name == header::HOST {
            continue;
        }
        s += name.as_str().len() as u64;
        for value in headers.get_all(name) {
            s += value.len() as u64;
        }
    }
    s += host_len(req) as u64;

    if let Some(len) = content_length(headers) {
        s += len;
    }
    s
}

fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn host_len<B>(req: &Request<B>) -> usize {
    match req.uri().authority() {
        Some(authority) => authority.as_str().len(),
        None => req.headers().get(header::HOST).map_or(0, |v| v.len()),
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
