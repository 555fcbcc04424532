use std::sync::Arc;
use async_trait::async_trait;

use crate::error::PortfolioError;
use crate::models::portfolio::{PortfolioDiff, PortfolioSnapshot};
use crate::traits::event_handler::PortfolioEventHandler;

/// Composite event handler that can combine multiple handlers
pub struct CompositeEventHandler {
    handlers: Vec<Arc<dyn PortfolioEventHandler>>,
}

impl CompositeEventHandler {
    /// Create a new composite event handler
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Add a handler to the composite
    pub fn add_handler(&mut self, handler: Arc<dyn PortfolioEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn PortfolioEventHandler>) -> Self {
        self.add_handler(handler);
        self
    }

    /// Check if there are any handlers
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortfolioEventHandler for CompositeEventHandler {
    async fn handle_snapshot(&self, snapshot: &PortfolioSnapshot, diff: &PortfolioDiff) {
        for handler in &self.handlers {
            handler.handle_snapshot(snapshot, diff).await;
        }
    }

    async fn handle_error(&self, error: &PortfolioError) {
        for handler in &self.handlers {
            handler.handle_error(error).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        snapshots: AtomicUsize,
        errors: AtomicUsize,
    }

    #[async_trait]
    impl PortfolioEventHandler for Counting {
        async fn handle_snapshot(&self, _: &PortfolioSnapshot, _: &PortfolioDiff) {
            self.snapshots.fetch_add(1, Ordering::SeqCst);
        }

        async fn handle_error(&self, _: &PortfolioError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_handler() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let composite = CompositeEventHandler::new().with_handler(a.clone()).with_handler(b.clone());
        assert_eq!(composite.len(), 2);

        let snapshot = PortfolioSnapshot::empty(1);
        composite.handle_snapshot(&snapshot, &PortfolioDiff::new()).await;
        composite
            .handle_error(&PortfolioError::remote_unavailable("price", "timeout"))
            .await;

        for handler in [&a, &b] {
            assert_eq!(handler.snapshots.load(Ordering::SeqCst), 1);
            assert_eq!(handler.errors.load(Ordering::SeqCst), 1);
        }
    }
}
