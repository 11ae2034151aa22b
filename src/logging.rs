//! The structured logger handed to activity code. It is a thin handle over a [tracing::Span]:
//! enriching a logger creates a child span carrying the new fields, so every event emitted in
//! its scope is annotated with them by whatever subscriber is installed.

use crate::activity::ActivityInfo;
use std::fmt::Display;
use tracing::Span;

/// Structured, leveled logger. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Logger {
    span: Span,
}

impl Logger {
    /// Wrap an existing span
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// A logger rooted at whatever span is current on the calling thread
    pub fn current() -> Self {
        Self::new(Span::current())
    }

    /// The span every event emitted through this logger is scoped to
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `f` inside this logger's span. Use this to emit events with arbitrary structured
    /// fields via the `tracing` macros.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }

    /// Emit a debug level event
    pub fn debug(&self, message: impl Display) {
        self.in_scope(|| debug!("{message}"))
    }

    /// Emit an info level event
    pub fn info(&self, message: impl Display) {
        self.in_scope(|| info!("{message}"))
    }

    /// Emit a warn level event
    pub fn warn(&self, message: impl Display) {
        self.in_scope(|| warn!("{message}"))
    }

    /// Emit an error level event
    pub fn error(&self, message: impl Display) {
        self.in_scope(|| error!("{message}"))
    }

    /// A child logger whose every event also carries the identifying fields of an activity
    pub(crate) fn for_activity(&self, info: &ActivityInfo) -> Self {
        // Error level, so the span is enabled whenever any event in it is
        Self::new(error_span!(
            parent: &self.span,
            "Activity",
            "ActivityID" = %info.activity_id,
            "ActivityType" = %info.activity_type.name,
            "Attempt" = info.attempt,
            "WorkflowType" = %info.workflow_type.name,
            "WorkflowID" = %info.workflow_execution.workflow_id,
            "RunID" = %info.workflow_execution.run_id,
        ))
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::current()
    }
}

/// Enrich a [Logger] with extra structured fields, returning a new logger. The base logger is
/// left untouched. The fields are kept under any level filter.
///
/// ```
/// use temporal_activity_context::{Logger, logger_with};
/// let base = Logger::current();
/// let enriched = logger_with!(base, "Shard" = 7, "Region" = "us-east");
/// enriched.info("rebalancing");
/// ```
#[macro_export]
macro_rules! logger_with {
    ($logger:expr, $($fields:tt)+) => {
        $crate::Logger::new(::tracing::error_span!(parent: $logger.span(), "Fields", $($fields)+))
    };
}

#[cfg(test)]
pub(crate) mod test_help {
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects everything a fmt subscriber writes so tests can assert on log output
    #[derive(Clone, Default)]
    pub(crate) struct CapturingWriter {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl CapturingWriter {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.buf.lock()).into_owned()
        }

        pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            self.subscriber_with_filter("debug")
        }

        pub(crate) fn subscriber_with_filter(
            &self,
            filter: &str,
        ) -> impl tracing::Subscriber + Send + Sync + 'static {
            tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_env_filter(filter)
                .with_ansi(false)
                .finish()
        }
    }

    impl MakeWriter<'_> for CapturingWriter {
        type Writer = CapturingHandle;

        fn make_writer(&self) -> Self::Writer {
            CapturingHandle(self.buf.clone())
        }
    }

    pub(crate) struct CapturingHandle(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturingHandle {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
