/// Receives scan progress. Every method is a hint; implementations must not fail.
pub trait ProgressSink: Send + Sync {
    /// Estimated number of files; may differ from the number actually processed.
    fn start(&self, total: u64);
    /// One file was attempted (written, sentinel or skipped).
    fn advance(&self);
    fn finish(&self);
}

/// Calls [`ProgressSink::finish`] when dropped, on every exit path.
pub(crate) struct ProgressGuard<'a> {
    sink: Option<&'a dyn ProgressSink>,
}

impl<'a> ProgressGuard<'a> {
    pub(crate) fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn advance(&self) {
        if let Some(sink) = self.sink {
            sink.advance();
        }
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        if let Some(sink) = self.sink {
            sink.finish();
        }
    }
}
