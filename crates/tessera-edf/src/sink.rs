//! Pluggable destinations for definition-time errors.

use crate::EdfError;

/// Receives non-fatal errors found while parsing or linking.
pub trait EdfErrorSink {
    fn report(&mut self, error: EdfError);
}

impl<F> EdfErrorSink for F
where
    F: FnMut(EdfError),
{
    fn report(&mut self, error: EdfError) {
        self(error)
    }
}

/// Logs every error through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EdfErrorSink for TracingSink {
    fn report(&mut self, error: EdfError) {
        tracing::error!(%error, "entity definition error");
    }
}

/// Keeps errors for later inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub errors: Vec<EdfError>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl EdfErrorSink for CollectingSink {
    fn report(&mut self, error: EdfError) {
        tracing::debug!(%error, "collected entity definition error");
        self.errors.push(error);
    }
}
