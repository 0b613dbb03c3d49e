//! Logging capability consumed by the server and adapters.

/// A string logger, shared between the server and every request it serves.
///
/// The server reports a missing handler through [`Logger::error`]; the
/// response adapter reports a repeated `write_header` through
/// [`Logger::warn`]. Implementations must be safe to call from any number of
/// connection threads at once.
///
/// # Examples
///
/// ```
/// use standard_engine::log::Logger;
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct Collect(Mutex<Vec<String>>);
///
/// impl Logger for Collect {
///     fn error(&self, message: &str) {
///         self.0.lock().unwrap().push(message.to_owned());
///     }
/// }
///
/// let logger = Collect::default();
/// logger.error("boom");
/// logger.warn("ignored by default");
/// assert_eq!(logger.0.lock().unwrap().len(), 1);
/// ```
pub trait Logger: Send + Sync {
    fn error(&self, message: &str);

    fn warn(&self, _message: &str) {}

    fn info(&self, _message: &str) {}

    fn debug(&self, _message: &str) {}
}

/// Default [`Logger`] forwarding to [`tracing`] under the `standard_engine` target.
///
/// Install any `tracing` subscriber to see the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    #[inline]
    fn error(&self, message: &str) {
        tracing::error!(target: "standard_engine", "{message}");
    }

    #[inline]
    fn warn(&self, message: &str) {
        tracing::warn!(target: "standard_engine", "{message}");
    }

    #[inline]
    fn info(&self, message: &str) {
        tracing::info!(target: "standard_engine", "{message}");
    }

    #[inline]
    fn debug(&self, message: &str) {
        tracing::debug!(target: "standard_engine", "{message}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Logger;
    use std::sync::Mutex;

    /// Records every message with its severity.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLogger {
        entries: Mutex<Vec<(&'static str, String)>>,
    }

    impl RecordingLogger {
        pub(crate) fn count(&self, level: &str) -> usize {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .count()
        }

        pub(crate) fn messages(&self, level: &str) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl Logger for RecordingLogger {
        fn error(&self, message: &str) {
            self.entries.lock().unwrap().push(("error", message.to_owned()));
        }

        fn warn(&self, message: &str) {
            self.entries.lock().unwrap().push(("warn", message.to_owned()));
        }
    }
}
