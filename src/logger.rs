use std::fmt;
use std::sync::Arc;

use crate::context::Context;

/// Sink for the two severities a request reports at.
///
/// The default is [`TracingLogger`]; swap in [`DiscardLogger`] to silence a
/// request, factory, or session.
pub trait Logger: Send + Sync {
    fn info(&self, context: &Context, message: fmt::Arguments<'_>);

    fn error(&self, context: &Context, message: fmt::Arguments<'_>);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, _context: &Context, message: fmt::Arguments<'_>) {
        tracing::info!(target: "chainreq", "{message}");
    }

    fn error(&self, _context: &Context, message: fmt::Arguments<'_>) {
        tracing::error!(target: "chainreq", "{message}");
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardLogger;

impl Logger for DiscardLogger {
    fn info(&self, _context: &Context, _message: fmt::Arguments<'_>) {}

    fn error(&self, _context: &Context, _message: fmt::Arguments<'_>) {}
}

pub fn tracing_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

pub fn discard_logger() -> Arc<dyn Logger> {
    Arc::new(DiscardLogger)
}
