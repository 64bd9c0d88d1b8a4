//! The contract between the store and its pluggable data sources.
//!
//! A collector is registered into a [`CollectorCatalog`] under a unique id.
//! The store instantiates one candidate per catalog entry and drives it
//! through its lifecycle: [`Collector::start`] is retried until it either
//! succeeds (the collector becomes active and is pulled on every pull tick)
//! or fails with a non-retriable error (the collector is discarded).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::store::Store;

mod error;

pub use error::{BoxError, PullError, StartError};

/// A pluggable source of entity metadata.
///
/// Implementations push changes into the store by calling
/// [`Store::notify`] from `pull` (or from tasks of their own).
#[async_trait]
pub trait Collector: Send + Sync {
    /// Initializes the collector and hands it the store it reports to.
    ///
    /// Returning [`StartError::Retriable`] leaves the collector as a
    /// candidate for the next retry tick; any other error discards it
    /// permanently.
    async fn start(&self, store: Arc<Store>) -> Result<(), StartError>;

    /// Pulls the latest changes from the upstream source.
    ///
    /// Called on every pull tick once the collector is active, bounded by
    /// the store's pull deadline. Errors are logged and never deactivate
    /// the collector.
    async fn pull(&self) -> Result<(), PullError>;
}

/// Factory producing a fresh collector instance.
pub type CollectorFactory = Box<dyn Fn() -> Arc<dyn Collector> + Send + Sync>;

/// Registry of collector factories, keyed by collector id.
///
/// The id doubles as the event source collectors are expected to stamp on
/// the events they produce. Built explicitly at startup and passed to
/// [`Store::new`](crate::store::Store::new); there is no global catalog.
#[derive(Default)]
pub struct CollectorCatalog {
    factories: HashMap<String, CollectorFactory>,
}

impl CollectorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collector factory under the given id, replacing any
    /// previous registration for it.
    pub fn register(&mut self, id: impl Into<String>, factory: CollectorFactory) {
        let id = id.into();
        if self.factories.insert(id.clone(), factory).is_some() {
            log::warn!("collector `{id}` registered more than once, keeping the last registration");
        }
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiates one collector per registered factory.
    pub(crate) fn instantiate(&self) -> HashMap<String, Arc<dyn Collector>> {
        self.factories
            .iter()
            .map(|(id, factory)| (id.clone(), factory()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopCollector;

    #[async_trait]
    impl Collector for NoopCollector {
        async fn start(&self, _store: Arc<Store>) -> Result<(), StartError> {
            Ok(())
        }

        async fn pull(&self) -> Result<(), PullError> {
            Ok(())
        }
    }

    fn noop_factory() -> CollectorFactory {
        Box::new(|| Arc::new(NoopCollector) as Arc<dyn Collector>)
    }

    #[test]
    fn test_catalog_instantiates_one_collector_per_entry() {
        let mut catalog = CollectorCatalog::new();
        assert!(catalog.is_empty());

        catalog.register("foo", noop_factory());
        catalog.register("bar", noop_factory());
        assert_eq!(catalog.len(), 2);

        let collectors = catalog.instantiate();
        assert_eq!(collectors.len(), 2);
        assert!(collectors.contains_key("foo"));
        assert!(collectors.contains_key("bar"));
    }

    #[test]
    fn test_catalog_keeps_last_registration() {
        let mut catalog = CollectorCatalog::new();
        catalog.register("foo", noop_factory());
        catalog.register("foo", noop_factory());
        assert_eq!(catalog.len(), 1);
    }
}
