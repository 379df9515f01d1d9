// Library root module for prom-middleware
// Prometheus request metrics (count, latency, request and response size) for
// tower/axum HTTP services, labeled by status code, method and route path.

pub mod config;
pub mod errors;
pub mod exposition;
pub mod metrics;
pub mod middleware;

pub use config::{AppConfig, MetricsConfig};
pub use errors::MetricsError;
pub use metrics::HttpMetrics;
pub use middleware::{MetricsLayer, MetricsService};
