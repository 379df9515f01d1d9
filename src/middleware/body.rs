// Response body that counts the bytes flowing through it
// Frames are forwarded untouched; metrics are recorded once the body ends,
// errors, or is dropped, whichever happens first.

use super::observation::Observation;
use crate::metrics::HttpMetrics;
use bytes::Buf;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Records a request's observation exactly once, at the latest on drop.
pub(crate) struct Recorder {
    metrics: HttpMetrics,
    observation: Option<Observation>,
}

impl Recorder {
    pub(crate) fn new(metrics: HttpMetrics, observation: Option<Observation>) -> Self {
        Self {
            metrics,
            observation,
        }
    }

    fn write(&mut self, n: u64) {
        if let Some(observation) = self.observation.as_mut() {
            observation.write(n);
        }
    }

    fn finish(&mut self) {
        if let Some(observation) = self.observation.take() {
            observation.record(&self.metrics);
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.finish();
    }
}

pin_project! {
    /// Body returned by [`super::MetricsService`].
    pub struct CountingBody<B> {
        #[pin]
        inner: B,
        recorder: Recorder,
    }
}

impl<B> CountingBody<B> {
    pub(crate) fn new(inner: B, recorder: Recorder) -> Self {
        Self { inner, recorder }
    }
}

impl<B> Body for CountingBody<B>
where
    B: Body,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        let frame = ready!(this.inner.as_mut().poll_frame(cx));

        match &frame {
            Some(Ok(f)) => {
                if let Some(data) = f.data_ref() {
                    this.recorder.write(data.remaining() as u64);
                }
                if this.inner.is_end_stream() {
                    this.recorder.finish();
                }
            }
            Some(Err(_)) | None => this.recorder.finish(),
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
