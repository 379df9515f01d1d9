// Scrape endpoint support
// Renders a prometheus registry in the text exposition format and serves it
// from an axum handler.

use crate::errors::MetricsError;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::error;

/// Encode everything gathered from `registry`. Returns the body and its content type.
pub fn render(registry: &Registry) -> Result<(String, &'static str), MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(MetricsError::Encode)?;
    Ok((String::from_utf8(buffer)?, prometheus::TEXT_FORMAT))
}

/// `GET /metrics` handler over the registry held in router state.
pub async fn metrics_handler(State(registry): State<Registry>) -> Response {
    match render(&registry) {
        Ok((body, content_type)) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode prometheus metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::metrics::{HttpMetrics, Labels, Sample};
    use std::time::Duration;

    #[test]
    fn renders_recorded_series() {
        let registry = Registry::new();
        let metrics = HttpMetrics::new(&MetricsConfig::default(), &registry).unwrap();
        metrics.record(
            &Labels {
                code: "200".into(),
                method: "get".into(),
                path: "/health".into(),
            },
            &Sample {
                elapsed: Duration::from_millis(20),
                request_size: 40,
                response_size: 2,
            },
        );

        let (body, content_type) = render(&registry).unwrap();
        assert_eq!(content_type, prometheus::TEXT_FORMAT);
        assert!(body.contains("# TYPE http_requests_total counter"));
        assert!(body.contains(r#"http_requests_total{code="200",method="get",path="/health"} 1"#));
        assert!(body.contains(
            r#"http_request_duration_seconds_bucket{code="200",method="get",path="/health",le="0.3"} 1"#
        ));
        assert!(body.contains(
            r#"response_size_bytes_bucket{code="200",method="get",path="/health",le="+Inf"} 1"#
        ));
    }

    #[test]
    fn empty_registry_renders_nothing() {
        let (body, _) = render(&Registry::new()).unwrap();
        assert!(body.is_empty());
    }
}
