/*!
 * Structured Tracing
 * Subscriber setup and timed operation spans using the tracing crate
 */

use std::time::Instant;
use tracing::{debug, info, span, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable switching log output to JSON
pub const ENV_TRACE_JSON: &str = "PERMTREE_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - PERMTREE_TRACE_JSON: Enable JSON output (default: false)
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .init();
        debug!("Structured tracing initialized");
    }
}

/// Timed span around one top-level operation
pub struct OperationSpan {
    span: tracing::Span,
    start: Instant,
}

impl OperationSpan {
    pub fn new(operation: &str, sequence: u64) -> Self {
        let span = span!(
            Level::DEBUG,
            "operation",
            operation = operation,
            sequence = sequence,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Close the span, recording duration and outcome
    pub fn finish(self, success: bool) {
        self.span
            .record("duration_us", self.start.elapsed().as_micros() as u64);
        self.span
            .record("result", if success { "success" } else { "error" });
    }
}

#[inline]
pub fn span_operation(operation: &str, sequence: u64) -> OperationSpan {
    OperationSpan::new(operation, sequence)
}
