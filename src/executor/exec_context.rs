//! Execution context handed to setup functions and test bodies

use std::any::Any;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::context::Context;
use crate::error::PushError;
use crate::models::{Payload, BASE_VARIANT};
use crate::platform::Platform;
use crate::push::{Listener, Subscriber, WaitHandle};

/// Append-only text sink owned by a single run or iteration
#[derive(Clone, Debug, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<String>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write_str(&self, s: &str) {
        self.lock().push_str(s);
    }

    pub fn write_line(&self, line: &str) {
        let mut buf = self.lock();
        buf.push_str(line);
        buf.push('\n');
    }

    pub fn contents(&self) -> String {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Information about the current run or iteration
#[derive(Clone)]
pub struct ExecutionContext {
    ctx: Context,
    test_id: String,
    iteration: usize,
    variant: String,
    variant_data: Option<Payload>,
    setup_data: Option<Payload>,
    config: String,
    timeout: Duration,
    writer: LogBuffer,
    header: LogBuffer,
    platform: Platform,
    last_step: Arc<Mutex<Instant>>,
}

impl ExecutionContext {
    /// Standalone context, mostly useful to exercise test bodies directly
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            test_id: super::new_test_id(),
            iteration: 0,
            variant: BASE_VARIANT.to_string(),
            variant_data: None,
            setup_data: None,
            config: String::new(),
            timeout: Duration::ZERO,
            writer: LogBuffer::new(),
            header: LogBuffer::new(),
            platform: Platform::default(),
            last_step: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn with_variant(mut self, label: impl Into<String>, data: Option<Payload>) -> Self {
        self.variant = label.into();
        self.variant_data = data;
        self
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub(crate) fn with_writer(mut self, writer: LogBuffer) -> Self {
        self.writer = writer;
        self
    }

    pub(crate) fn with_header(mut self, header: LogBuffer) -> Self {
        self.header = header;
        self
    }

    /// Derive the context of one iteration from the run context
    pub(crate) fn for_iteration(
        &self,
        iteration: usize,
        setup_data: Option<Payload>,
        writer: LogBuffer,
    ) -> Self {
        let mut t = self.clone();
        t.test_id = super::new_test_id();
        t.iteration = iteration;
        t.setup_data = setup_data;
        t.writer = writer;
        t.last_step = Arc::new(Mutex::new(Instant::now()));
        t
    }

    /// Identifier generated for this iteration
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Zero-based iteration number
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Variant label and its raw payload
    pub fn variant(&self) -> (&str, Option<&Payload>) {
        (&self.variant, self.variant_data.as_ref())
    }

    /// Variant payload as `T`, if present and of that type
    pub fn variant_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.variant_data.as_ref()?.downcast_ref::<T>()
    }

    /// Data returned by the setup function, if of type `T`
    pub fn setup_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.setup_data.as_ref()?.downcast_ref::<T>()
    }

    /// Free-form test configuration given on the command line
    pub fn config(&self) -> &str {
        &self.config
    }

    /// Global time limit of the suite
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left before the suite deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.ctx.remaining()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Append a line to the log
    pub fn log(&self, line: impl AsRef<str>) {
        self.writer.write_line(line.as_ref());
    }

    /// Writer over the same log, for `write!`
    pub fn writer(&self) -> LogBuffer {
        self.writer.clone()
    }

    pub fn log_contents(&self) -> String {
        self.writer.contents()
    }

    /// Append a line to the run header
    pub fn write_header(&self, line: impl AsRef<str>) {
        self.header.write_line(line.as_ref());
    }

    /// Unique account name for this iteration
    pub fn account_name(&self) -> String {
        format!("account-{}", self.test_id)
    }

    pub fn account_namespace(&self) -> String {
        format!("/{}", self.account_name())
    }

    /// Unique namespace under the iteration account
    pub fn test_namespace(&self) -> String {
        format!("/{}/{}-{}", self.account_name(), self.test_id, self.iteration)
    }

    /// Reset the step clock
    pub fn mark_step(&self) {
        *self.last_step.lock().unwrap_or_else(|p| p.into_inner()) = Instant::now();
    }

    /// Time since the previous step, rounded to the millisecond
    pub fn time_since_last_step(&self) -> Duration {
        let last = *self.last_step.lock().unwrap_or_else(|p| p.into_inner());
        Duration::from_millis(last.elapsed().as_millis() as u64)
    }

    /// Arm a push listener scoped to this iteration's context
    pub async fn arm_push(
        &self,
        listener: Listener,
        subscriber: &mut dyn Subscriber,
    ) -> Result<WaitHandle, PushError> {
        listener.arm(&self.ctx, subscriber).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn test_log_buffer_writes() {
        let mut buf = LogBuffer::new();
        write!(buf, "hello ").unwrap();
        buf.write_line("world");
        assert_eq!(buf.contents(), "hello world\n");
    }

    #[test]
    fn test_iteration_context() {
        let run = ExecutionContext::new(Context::background())
            .with_variant("data-variant", Some(Arc::new("payload")))
            .with_config("env=preprod");

        let it = run.for_iteration(2, Some(Arc::new(42u32)), LogBuffer::new());

        assert_eq!(it.iteration(), 2);
        assert_ne!(it.test_id(), run.test_id());
        assert_eq!(it.variant().0, "data-variant");
        assert_eq!(it.variant_data::<&str>(), Some(&"payload"));
        assert_eq!(it.setup_data::<u32>(), Some(&42));
        assert_eq!(it.setup_data::<String>(), None);
        assert_eq!(it.config(), "env=preprod");
    }

    #[test]
    fn test_iteration_logs_are_separate() {
        let run = ExecutionContext::new(Context::background());
        let a = run.for_iteration(0, None, LogBuffer::new());
        let b = run.for_iteration(1, None, LogBuffer::new());
        a.log("from a");
        assert!(b.log_contents().is_empty());
        assert!(run.log_contents().is_empty());
    }

    #[test]
    fn test_account_helpers() {
        let t = ExecutionContext::new(Context::background());
        assert_eq!(t.account_name(), format!("account-{}", t.test_id()));
        assert!(t.test_namespace().ends_with("-0"));
    }
}
