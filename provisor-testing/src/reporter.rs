/// Where the orchestrator reports outcomes; supplied by the embedding test
/// harness.
///
/// `fatal` marks the test failed like `error` does. Implementations should
/// record rather than unwind, since the orchestrator keeps going to tear
/// down whatever it created.
pub trait TestReporter {
    fn error(&mut self, msg: &str);
    fn fatal(&mut self, msg: &str);
    fn skip(&mut self, msg: &str);
}

/// A [`TestReporter`] that keeps every message.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub errors: Vec<String>,
    pub fatals: Vec<String>,
    pub skips: Vec<String>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(&self) -> bool {
        !self.errors.is_empty() || !self.fatals.is_empty()
    }

    pub fn skipped(&self) -> bool {
        !self.skips.is_empty()
    }

    /// The most relevant message: the first fatal, else the first error, else
    /// the first skip.
    pub fn fail_message(&self) -> Option<&str> {
        self.fatals
            .first()
            .or(self.errors.first())
            .or(self.skips.first())
            .map(String::as_str)
    }

    /// Panic with all failure messages if anything failed.
    pub fn assert_ok(&self) {
        if self.failed() {
            let messages: Vec<&str> = self
                .fatals
                .iter()
                .chain(self.errors.iter())
                .map(String::as_str)
                .collect();
            panic!("test failed:\n  {}", messages.join("\n  "));
        }
    }
}

impl TestReporter for Recorder {
    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn fatal(&mut self, msg: &str) {
        self.fatals.push(msg.to_string());
    }

    fn skip(&mut self, msg: &str) {
        self.skips.push(msg.to_string());
    }
}

/// Forwards to another reporter, remembering whether a failure went by.
pub(crate) struct Tracked<'r> {
    inner: &'r mut dyn TestReporter,
    failures: usize,
}

impl<'r> Tracked<'r> {
    pub(crate) fn new(inner: &'r mut dyn TestReporter) -> Self {
        Tracked { inner, failures: 0 }
    }

    pub(crate) fn failures(&self) -> usize {
        self.failures
    }
}

impl TestReporter for Tracked<'_> {
    fn error(&mut self, msg: &str) {
        tracing::error!("{}", msg);
        self.failures += 1;
        self.inner.error(msg);
    }

    fn fatal(&mut self, msg: &str) {
        tracing::error!("{}", msg);
        self.failures += 1;
        self.inner.fatal(msg);
    }

    fn skip(&mut self, msg: &str) {
        tracing::info!("skipping: {}", msg);
        self.inner.skip(msg);
    }
}
