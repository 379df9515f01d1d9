// Configuration management module
// Middleware options (histogram buckets, metric name prefixes) and the demo
// server settings, loaded from an optional config file and the environment.

use crate::errors::MetricsError;
use serde::Deserialize;

/// Bucket upper bounds used when none are configured.
pub const DEFAULT_BUCKETS: [f64; 4] = [0.3, 1.0, 2.5, 5.0];

/// Options for [`crate::metrics::HttpMetrics`]. Supplied once at construction.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Histogram bucket upper bounds. Empty means [`DEFAULT_BUCKETS`].
    ///
    /// The same bounds are shared by the latency histogram (seconds) and both
    /// size histograms (bytes).
    pub buckets: Vec<f64>,
    /// Prefix inserted between the namespace and every metric name.
    pub subsystem: String,
    /// Outermost metric name prefix.
    pub namespace: String,
}

impl MetricsConfig {
    pub fn with_buckets(mut self, buckets: impl Into<Vec<f64>>) -> Self {
        self.buckets = buckets.into();
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Buckets to hand to the histograms, after defaulting and validation.
    pub fn effective_buckets(&self) -> Result<Vec<f64>, MetricsError> {
        if self.buckets.is_empty() {
            return Ok(DEFAULT_BUCKETS.to_vec());
        }
        for (i, b) in self.buckets.iter().enumerate() {
            if !b.is_finite() || *b <= 0.0 {
                return Err(MetricsError::InvalidBuckets(format!(
                    "bucket {b} at index {i} must be positive and finite"
                )));
            }
            if i > 0 && *b <= self.buckets[i - 1] {
                return Err(MetricsError::InvalidBuckets(format!(
                    "bucket {b} at index {i} is not greater than {}",
                    self.buckets[i - 1]
                )));
            }
        }
        Ok(self.buckets.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listen address for the demo server, e.g. 0.0.0.0:8080
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    /// Load from `prom-middleware.{yaml,toml,json}` if present, then from
    /// `APP__*` environment variables, e.g. `APP__METRICS__SUBSYSTEM=api` or
    /// `APP__METRICS__BUCKETS=0.1,0.5,1`.
    pub fn load() -> Result<Self, MetricsError> {
        Self::load_from(config::Environment::with_prefix("APP"))
    }

    fn load_from(env: config::Environment) -> Result<Self, MetricsError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("prom-middleware").required(false))
            .add_source(
                env.separator("__")
                    .list_separator(",")
                    .with_list_parse_key("metrics.buckets")
                    .try_parsing(true),
            )
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}
