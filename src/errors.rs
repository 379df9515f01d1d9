// Error types for the metrics middleware
// Construction, configuration and exposition failures are collected here;
// nothing on the per-request path can fail.

use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("instrument error: {0}")]
    Instrument(#[source] prometheus::Error),
    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(String),
    #[error("encode error: {0}")]
    Encode(#[source] prometheus::Error),
    #[error("exposition is not valid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}
