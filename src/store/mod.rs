//! The workload metadata store and its scheduling loop.
//!
//! The store owns three things: the entity map, the set of collectors
//! feeding it, and the list of subscribers consuming it. All state
//! transitions run on a single loop task; producers hand event batches to
//! the loop through [`Store::notify`], readers go straight to the entity map
//! under a read lock and never touch the loop.
//!
//! Collectors move one-way through their lifecycle: every catalog entry
//! starts as a *candidate*; a successful start promotes it to *active*
//! (pulled on every pull tick from then on), a retriable start failure
//! leaves it as a candidate for the next retry tick, and any other failure
//! discards it permanently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, CollectorCatalog};
use crate::entity::{Container, ECSTask, Entity, Kind, KubernetesPod};
use crate::event::Event;
use crate::filter::Filter;
use crate::health;

mod config;
mod error;
mod subscription;

pub use config::{DEFAULT_PULL_INTERVAL, DEFAULT_RETRY_INTERVAL, StoreConfig};
pub use error::{Error, Result};
pub use subscription::Subscription;

use subscription::Subscriber;

const LIVENESS_NAME: &str = "metastore";

/// An entity value along with the source that last wrote it.
#[derive(Debug, Clone)]
struct StoredEntity {
    source: String,
    entity: Entity,
}

/// Aggregates workload metadata from collectors and republishes changes to
/// subscribers.
///
/// Constructed once per process with [`Store::new`] and shared by handle;
/// inert until [`Store::run`] starts the scheduling loop.
pub struct Store {
    entities: RwLock<HashMap<Kind, HashMap<String, StoredEntity>>>,
    subscribers: tokio::sync::Mutex<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    event_tx: mpsc::Sender<Vec<Event>>,
    runner: Mutex<Option<Runner>>,
}

impl Store {
    /// Creates a new metadata store with one candidate collector per
    /// catalog entry. Call [`Store::run`] to start it.
    pub fn new(catalog: &CollectorCatalog, config: StoreConfig) -> Arc<Self> {
        // Capacity 1 is the closest tokio gets to an unbuffered channel: at
        // most one batch queues before producers block on the loop.
        let (event_tx, event_rx) = mpsc::channel(1);

        Arc::new(Self {
            entities: RwLock::new(HashMap::new()),
            subscribers: tokio::sync::Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
            event_tx,
            runner: Mutex::new(Some(Runner {
                candidates: catalog.instantiate(),
                collectors: HashMap::new(),
                event_rx,
                config,
            })),
        })
    }

    /// Starts the scheduling loop and returns without blocking.
    ///
    /// The loop starts candidate collectors and performs one pull
    /// immediately, so a fresh store is populated without waiting a full
    /// interval. It runs until `shutdown` is cancelled, then drains
    /// in-flight pulls and deregisters its liveness probe.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn run(self: Arc<Self>, health: &health::Registry, shutdown: CancellationToken) {
        let runner = self
            .runner
            .lock()
            .expect("store lock poisoned")
            .take()
            .expect("Store::run called more than once");
        let liveness = health.register_liveness(LIVENESS_NAME);

        tokio::spawn(runner.run(self, liveness, shutdown));
    }

    /// Hands a batch of events to the scheduling loop.
    ///
    /// An empty batch is a no-op. Otherwise this may block until the loop
    /// is ready to receive the batch; that is the intended backpressure on
    /// producers.
    pub async fn notify(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }

        if self.event_tx.send(events).await.is_err() {
            // Only possible once the loop has shut down.
            log::debug!("store loop is gone, dropping notified events");
        }
    }

    /// Registers a subscriber and returns its subscription.
    ///
    /// If the store already holds entities matching the filter, a single
    /// bootstrap bundle of `Set` events for them is waiting on the channel
    /// before this returns, so late joiners see existing state without
    /// waiting for the next live change. An absent filter matches
    /// everything.
    pub async fn subscribe(&self, name: impl Into<String>, filter: Option<Filter>) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (subscriber, subscription) = Subscriber::new(id, name.into(), filter);

        // Held until the subscriber is in the list so live fan-out cannot
        // slip a batch in ahead of the bootstrap bundle.
        let mut subscribers = self.subscribers.lock().await;

        let bootstrap = {
            let entities = self.entities.read().expect("entity map lock poisoned");
            let mut events = Vec::new();

            for (kind, of_kind) in entities.iter() {
                if let Some(filter) = subscriber.filter() {
                    if !filter.match_kind(*kind) {
                        continue;
                    }
                }

                for stored in of_kind.values() {
                    if let Some(filter) = subscriber.filter() {
                        if !filter.match_source(&stored.source) {
                            continue;
                        }
                    }

                    events.push(Event::set(stored.source.clone(), stored.entity.clone()));
                }
            }

            events
        };

        if !bootstrap.is_empty() {
            // The bundle parks in the delivery channel until the caller
            // starts reading; nothing blocks on its acknowledgement.
            let _ = subscriber.send(bootstrap).await;
        }

        subscribers.push(subscriber);

        subscription
    }

    /// Ends a subscription and closes its delivery channel; the next
    /// [`Subscription::recv`] after any in-flight bundle returns `None`.
    ///
    /// Events already in flight are not drained. No bundle is delivered to
    /// the channel after this returns.
    pub async fn unsubscribe(&self, subscription: &Subscription) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|subscriber| subscriber.id() != subscription.id());
        // Dropping the subscriber's sender is what closes the channel.
    }

    /// Returns metadata about a container.
    pub fn container(&self, id: &str) -> Result<Container> {
        match self.entity_by_kind(Kind::Container, id)? {
            Entity::Container(container) => Ok(container),
            _ => Err(Error::NotFound {
                kind: Kind::Container,
                id: id.to_owned(),
            }),
        }
    }

    /// Returns metadata about a Kubernetes pod.
    pub fn kubernetes_pod(&self, id: &str) -> Result<KubernetesPod> {
        match self.entity_by_kind(Kind::KubernetesPod, id)? {
            Entity::KubernetesPod(pod) => Ok(pod),
            _ => Err(Error::NotFound {
                kind: Kind::KubernetesPod,
                id: id.to_owned(),
            }),
        }
    }

    /// Returns metadata about an ECS task.
    pub fn ecs_task(&self, id: &str) -> Result<ECSTask> {
        match self.entity_by_kind(Kind::ECSTask, id)? {
            Entity::ECSTask(task) => Ok(task),
            _ => Err(Error::NotFound {
                kind: Kind::ECSTask,
                id: id.to_owned(),
            }),
        }
    }

    fn entity_by_kind(&self, kind: Kind, id: &str) -> Result<Entity> {
        let entities = self.entities.read().expect("entity map lock poisoned");

        entities
            .get(&kind)
            .and_then(|of_kind| of_kind.get(id))
            .map(|stored| stored.entity.clone())
            .ok_or_else(|| Error::NotFound {
                kind,
                id: id.to_owned(),
            })
    }

    /// Applies a batch to the entity map, then fans it out to subscribers.
    async fn handle_events(&self, events: Vec<Event>) {
        self.apply_events(&events);
        self.fan_out(&events).await;
    }

    fn apply_events(&self, events: &[Event]) {
        let mut entities = self.entities.write().expect("entity map lock poisoned");

        for event in events {
            match event {
                Event::Set { source, entity } => {
                    let id = entity.id();
                    entities.entry(id.kind).or_default().insert(
                        id.id.clone(),
                        StoredEntity {
                            source: source.clone(),
                            entity: entity.clone(),
                        },
                    );
                }
                Event::Unset { id, .. } => {
                    if let Some(of_kind) = entities.get_mut(&id.kind) {
                        of_kind.remove(&id.id);
                    }
                }
            }
        }

        // The write lock is released here, before fan-out, so a slow
        // subscriber never blocks readers or writers. Subscribers may
        // therefore observe map state slightly ahead of the events they
        // are currently processing.
    }

    async fn fan_out(&self, events: &[Event]) {
        let subscribers = self.subscribers.lock().await;

        for subscriber in subscribers.iter() {
            let filtered: Vec<Event> = events
                .iter()
                .filter(|event| subscriber.matches(event))
                .cloned()
                .collect();

            if filtered.is_empty() {
                continue;
            }

            let sent = filtered.len();

            // Waiting for the acknowledgement here means a slow subscriber
            // delays the rest of this round and the loop's next iteration,
            // not already-applied map state.
            if subscriber.deliver(filtered).await.is_err() {
                log::debug!(
                    "subscriber `{}` dropped its channel without unsubscribing",
                    subscriber.name()
                );
                continue;
            }

            log::debug!("sent {sent} events to subscriber `{}`", subscriber.name());
        }
    }
}

/// Loop-owned state: candidate and active collectors, the event receiver
/// and the scheduling configuration. Only ever touched from the loop task,
/// so none of it needs a lock.
struct Runner {
    candidates: HashMap<String, Arc<dyn Collector>>,
    collectors: HashMap<String, Arc<dyn Collector>>,
    event_rx: mpsc::Receiver<Vec<Event>>,
    config: StoreConfig,
}

impl Runner {
    async fn run(
        mut self,
        store: Arc<Store>,
        mut liveness: health::Liveness,
        shutdown: CancellationToken,
    ) {
        let mut pull_tasks: JoinSet<()> = JoinSet::new();

        // Start candidates and pull once up front so a fresh store is
        // populated before the first timer fires.
        self.start_candidates(&store).await;
        self.pull(&mut pull_tasks);

        let pull_interval = self.config.pull_interval;
        let retry_interval = self.config.retry_interval;
        let mut pull_ticker = time::interval_at(Instant::now() + pull_interval, pull_interval);
        let mut retry_ticker = time::interval_at(Instant::now() + retry_interval, retry_interval);

        log::info!("metadata store initialized successfully");

        loop {
            tokio::select! {
                _ = liveness.tick() => {}

                _ = pull_ticker.tick() => {
                    self.pull(&mut pull_tasks);
                }

                Some(events) = self.event_rx.recv() => {
                    store.handle_events(events).await;
                }

                // The retry arm goes quiet once every candidate has been
                // promoted or discarded.
                _ = retry_ticker.tick(), if !self.candidates.is_empty() => {
                    self.start_candidates(&store).await;
                }

                Some(result) = pull_tasks.join_next(), if !pull_tasks.is_empty() => {
                    if let Err(err) = result {
                        log::error!("pull task failed: {err}");
                    }
                }

                _ = shutdown.cancelled() => {
                    // In-flight pulls are already bounded by the pull
                    // deadline; wait them out for a clean drain.
                    while pull_tasks.join_next().await.is_some() {}

                    liveness.deregister();

                    return;
                }
            }
        }
    }

    async fn start_candidates(&mut self, store: &Arc<Store>) {
        let candidates = std::mem::take(&mut self.candidates);

        for (id, collector) in candidates {
            match collector.start(Arc::clone(store)).await {
                Ok(()) => {
                    log::info!("collector `{id}` started successfully");
                    self.collectors.insert(id, collector);
                }
                Err(err) if err.is_retriable() => {
                    log::debug!("collector `{id}` {err}");
                    self.candidates.insert(id, collector);
                }
                Err(err) => {
                    // Discarded permanently: never retried, never pulled.
                    log::info!("collector `{id}` {err}");
                }
            }
        }
    }

    fn pull(&mut self, tasks: &mut JoinSet<()>) {
        let deadline = self.config.pull_interval;

        for (id, collector) in &self.collectors {
            let id = id.clone();
            let collector = Arc::clone(collector);

            // Each pull runs as its own task so a slow collector stalls
            // neither the loop nor the other collectors.
            tasks.spawn(async move {
                match time::timeout(deadline, collector.pull()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        log::warn!("error pulling from collector `{id}`: {err}");
                    }
                    Err(_) => {
                        log::warn!("pull from collector `{id}` timed out after {deadline:?}");
                    }
                }
            });
        }
    }
}
