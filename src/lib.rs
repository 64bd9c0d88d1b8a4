//! Creo Metastore: an in-memory registry of container workload metadata.
//!
//! The [`store::Store`] aggregates entities (containers, Kubernetes pods,
//! ECS tasks) from pluggable [`collector::Collector`]s and republishes every
//! change to subscribers as filtered [`event::EventBundle`]s. Collectors are
//! registered into a [`collector::CollectorCatalog`] at startup; the store
//! starts them with retry semantics and pulls each active collector on a
//! fixed interval.
//!
//! # Example
//!
//! ```no_run
//! use creo_metastore::collector::CollectorCatalog;
//! use creo_metastore::entity::Kind;
//! use creo_metastore::filter::Filter;
//! use creo_metastore::health;
//! use creo_metastore::store::{Store, StoreConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Register collector factories here.
//!     let catalog = CollectorCatalog::new();
//!
//!     let store = Store::new(&catalog, StoreConfig::from_env());
//!     let health = health::Registry::new();
//!     let shutdown = CancellationToken::new();
//!     store.clone().run(&health, shutdown.clone());
//!
//!     let mut subscription = store
//!         .subscribe("tagger", Some(Filter::new().kinds([Kind::Container])))
//!         .await;
//!
//!     while let Some(mut bundle) = subscription.recv().await {
//!         bundle.acknowledge();
//!         for event in &bundle.events {
//!             // React to the change.
//!             let _ = event;
//!         }
//!     }
//! }
//! ```

pub mod collector;
pub mod entity;
pub mod event;
pub mod filter;
pub mod health;
pub mod store;
