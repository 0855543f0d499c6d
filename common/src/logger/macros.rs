use tracing::{Level, Span, field};

use super::TraceId;

/// Create a root span for one monitoring session.
///
/// `instrument` starts empty and is recorded once the session knows which
/// instrument it is watching.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::span!(
        Level::INFO,
        "session",
        name = %name,
        trace_id = %trace_id,
        instrument = field::Empty
    )
}

/// Create a child span (inherits trace_id automatically)
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "cycle", name = %name)
}
