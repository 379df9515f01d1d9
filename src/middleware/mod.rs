// HTTP instrumentation middleware
// MetricsLayer wraps a handler chain; CountingBody is the interposed response
// sink that taps the status code and response byte count.

mod body;
mod layer;
mod observation;
mod route;

pub use body::CountingBody;
pub use layer::{MetricsLayer, MetricsService, ResponseFuture};
pub use observation::{approximate_request_size, sanitize_code, sanitize_method};
pub use route::{MatchedPathResolver, RouteResolver, UriPathResolver};
