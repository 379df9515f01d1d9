// Metrics and observability module
// Defines the four HTTP instruments recorded by the middleware and binds them
// into a prometheus registry.

use crate::config::MetricsConfig;
use crate::errors::MetricsError;
use prometheus::core::Collector;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::Duration;
use tracing::{error, warn};

pub const REQUEST_NAME: &str = "http_requests_total";
pub const LATENCY_NAME: &str = "http_request_duration_seconds";
pub const REQUEST_SIZE_NAME: &str = "request_size_bytes";
pub const RESPONSE_SIZE_NAME: &str = "response_size_bytes";

/// Label dimensions shared by every instrument, in `with_label_values` order.
pub const LABELS: [&str; 3] = ["code", "method", "path"];

/// Label tuple identifying one series in each instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Labels {
    pub code: String,
    pub method: String,
    pub path: String,
}

impl Labels {
    fn values(&self) -> [&str; 3] {
        [&self.code, &self.method, &self.path]
    }
}

/// Values observed for one finished request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed: Duration,
    pub request_size: u64,
    pub response_size: u64,
}

/// Request counter plus latency and size histograms, labeled by code, method and path.
#[derive(Clone)]
pub struct HttpMetrics {
    request: CounterVec,
    latency: HistogramVec,
    req_size: HistogramVec,
    res_size: HistogramVec,
}

impl HttpMetrics {
    /// Create the instruments and register them into `registry`.
    ///
    /// A name collision (e.g. a second middleware on the same registry) is
    /// logged and the freshly created instrument is kept.
    pub fn new(cfg: &MetricsConfig, registry: &Registry) -> Result<Self, MetricsError> {
        let buckets = cfg.effective_buckets()?;

        let request = CounterVec::new(
            Opts::new(
                REQUEST_NAME,
                "How many HTTP requests processed, partitioned by status code, method and HTTP path.",
            )
            .namespace(cfg.namespace.as_str())
            .subsystem(cfg.subsystem.as_str()),
            &LABELS,
        )
        .map_err(MetricsError::Instrument)?;
        register_or_log(registry, REQUEST_NAME, &request);

        let latency = histogram(
            cfg,
            LATENCY_NAME,
            "How long it took to process the request, partitioned by status code, method and HTTP path.",
            &buckets,
        )?;
        register_or_log(registry, LATENCY_NAME, &latency);

        let req_size = histogram(
            cfg,
            REQUEST_SIZE_NAME,
            "How large was the request, partitioned by status code, method and HTTP path.",
            &buckets,
        )?;
        register_or_log(registry, REQUEST_SIZE_NAME, &req_size);

        let res_size = histogram(
            cfg,
            RESPONSE_SIZE_NAME,
            "How large was the response, partitioned by status code, method and HTTP path.",
            &buckets,
        )?;
        register_or_log(registry, RESPONSE_SIZE_NAME, &res_size);

        Ok(Self {
            request,
            latency,
            req_size,
            res_size,
        })
    }

    /// Same as [`HttpMetrics::new`] against the process-wide default registry.
    pub fn with_default_registry(cfg: &MetricsConfig) -> Result<Self, MetricsError> {
        Self::new(cfg, prometheus::default_registry())
    }

    /// Record one finished request into all four instruments.
    pub fn record(&self, labels: &Labels, sample: &Sample) {
        let values = labels.values();
        self.request.with_label_values(&values).inc();
        self.latency
            .with_label_values(&values)
            .observe(sample.elapsed.as_secs_f64());
        self.req_size
            .with_label_values(&values)
            .observe(sample.request_size as f64);
        self.res_size
            .with_label_values(&values)
            .observe(sample.response_size as f64);
    }
}

fn histogram(
    cfg: &MetricsConfig,
    name: &str,
    help: &str,
    buckets: &[f64],
) -> Result<HistogramVec, MetricsError> {
    let opts = HistogramOpts::new(name, help)
        .namespace(cfg.namespace.as_str())
        .subsystem(cfg.subsystem.as_str())
        .buckets(buckets.to_vec());
    HistogramVec::new(opts, &LABELS).map_err(MetricsError::Instrument)
}

fn register_or_log<C>(registry: &Registry, name: &str, collector: &C)
where
    C: Collector + Clone + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        match err {
            prometheus::Error::AlreadyReg => {
                warn!(metric = %name, error = %err, "metric was not registered; already present")
            }
            _ => error!(metric = %name, error = %err, "metric was not registered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(code: &str) -> Labels {
        Labels {
            code: code.to_string(),
            method: "get".to_string(),
            path: "/users/:id".to_string(),
        }
    }

    fn sample() -> Sample {
        Sample {
            elapsed: Duration::from_millis(1500),
            request_size: 120,
            response_size: 35,
        }
    }

    #[test]
    fn registers_four_instruments() {
        let registry = Registry::new();
        let metrics = HttpMetrics::new(&MetricsConfig::default(), &registry).unwrap();
        metrics.record(&labels("200"), &sample());

        let mut names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                LATENCY_NAME.to_string(),
                REQUEST_NAME.to_string(),
                REQUEST_SIZE_NAME.to_string(),
                RESPONSE_SIZE_NAME.to_string(),
            ]
        );
    }

    #[test]
    fn prefixes_apply_to_every_instrument() {
        let registry = Registry::new();
        let cfg = MetricsConfig::default()
            .with_namespace("shop")
            .with_subsystem("api");
        let metrics = HttpMetrics::new(&cfg, &registry).unwrap();
        metrics.record(&labels("200"), &sample());

        let families = registry.gather();
        assert_eq!(families.len(), 4);
        for family in &families {
            assert!(
                family.get_name().starts_with("shop_api_"),
                "{} is not prefixed",
                family.get_name()
            );
        }
    }

    #[test]
    fn histograms_share_default_buckets() {
        let registry = Registry::new();
        let metrics = HttpMetrics::new(&MetricsConfig::default(), &registry).unwrap();
        metrics.record(&labels("200"), &sample());

        for family in registry.gather() {
            if family.get_name() == REQUEST_NAME {
                continue;
            }
            let hist = family.get_metric()[0].get_histogram();
            let bounds: Vec<f64> = hist
                .get_bucket()
                .iter()
                .map(|b| b.get_upper_bound())
                .collect();
            assert_eq!(bounds, vec![0.3, 1.0, 2.5, 5.0], "{}", family.get_name());
            assert_eq!(hist.get_sample_count(), 1);
        }
    }

    #[test]
    fn record_observes_every_value() {
        let registry = Registry::new();
        let metrics = HttpMetrics::new(&MetricsConfig::default(), &registry).unwrap();
        metrics.record(&labels("404"), &sample());

        for family in registry.gather() {
            let metric = &family.get_metric()[0];
            let pairs: Vec<(&str, &str)> = metric
                .get_label()
                .iter()
                .map(|l| (l.get_name(), l.get_value()))
                .collect();
            assert_eq!(
                pairs,
                vec![("code", "404"), ("method", "get"), ("path", "/users/:id")]
            );
            match family.get_name() {
                REQUEST_NAME => assert_eq!(metric.get_counter().get_value(), 1.0),
                LATENCY_NAME => assert_eq!(metric.get_histogram().get_sample_sum(), 1.5),
                REQUEST_SIZE_NAME => assert_eq!(metric.get_histogram().get_sample_sum(), 120.0),
                RESPONSE_SIZE_NAME => assert_eq!(metric.get_histogram().get_sample_sum(), 35.0),
                other => panic!("unexpected family {other}"),
            }
        }
    }

    #[test]
    fn duplicate_registration_is_not_fatal() {
        let registry = Registry::new();
        let cfg = MetricsConfig::default().with_subsystem("dup");
        let first = HttpMetrics::new(&cfg, &registry).unwrap();
        let second = HttpMetrics::new(&cfg, &registry).unwrap();

        first.record(&labels("200"), &sample());
        second.record(&labels("200"), &sample());

        let counter = registry
            .gather()
            .into_iter()
            .find(|f| f.get_name() == "dup_http_requests_total")
            .unwrap();
        // only the first instance's instrument is visible to the registry
        assert_eq!(counter.get_metric()[0].get_counter().get_value(), 1.0);
    }

    #[test]
    fn invalid_buckets_fail_construction() {
        let registry = Registry::new();
        let cfg = MetricsConfig::default().with_buckets([2.0, 1.0]);
        assert!(matches!(
            HttpMetrics::new(&cfg, &registry),
            Err(MetricsError::InvalidBuckets(_))
        ));
    }

    #[test]
    fn invalid_subsystem_fails_construction() {
        let registry = Registry::new();
        let cfg = MetricsConfig::default().with_subsystem("bad subsystem");
        assert!(matches!(
            HttpMetrics::new(&cfg, &registry),
            Err(MetricsError::Instrument(_))
        ));
    }
}
