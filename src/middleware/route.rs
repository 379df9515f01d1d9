// Route template resolution
// The middleware asks a resolver for the matched route of each request so the
// path label carries the template rather than the literal URL.

use axum::extract::MatchedPath;
use http::Request;

/// Looks up the route template a request was matched against.
pub trait RouteResolver: Clone + Send + Sync + 'static {
    /// `None` when no route matched; recorded as an empty path label.
    fn resolve<B>(&self, req: &Request<B>) -> Option<String>;
}

/// Reads axum's [`MatchedPath`] extension, e.g. `/users/:id`.
///
/// Only populated once routing has run, so apply the layer through
/// `Router::layer` or `Router::route_layer`. Fallback requests resolve to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchedPathResolver;

impl RouteResolver for MatchedPathResolver {
    fn resolve<B>(&self, req: &Request<B>) -> Option<String> {
        req.extensions()
            .get::<MatchedPath>()
            .map(|path| path.as_str().to_owned())
    }
}

/// Uses the literal request path. For stacks without route templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriPathResolver;

impl RouteResolver for UriPathResolver {
    fn resolve<B>(&self, req: &Request<B>) -> Option<String> {
        Some(req.uri().path().to_owned())
    }
}
