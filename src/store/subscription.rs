use tokio::sync::mpsc;

use crate::event::{Event, EventBundle};
use crate::filter::Filter;

/// Delivery channel capacity. A single slot gives synchronous hand-off
/// semantics: one bundle can be in flight per subscriber, and the ack
/// round-trip throttles the store behind slow consumers.
const DELIVERY_BUFFER: usize = 1;

/// A live subscription to store events.
///
/// Obtained from [`Store::subscribe`](super::Store::subscribe). Reading ends
/// when the subscription is passed back to
/// [`Store::unsubscribe`](super::Store::unsubscribe), which closes the
/// channel; [`Subscription::recv`] then returns `None`.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<EventBundle>,
}

impl Subscription {
    /// Receives the next event bundle, or `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<EventBundle> {
        self.rx.recv().await
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }
}

/// Store-side record of one subscriber.
pub(super) struct Subscriber {
    id: u64,
    name: String,
    tx: mpsc::Sender<EventBundle>,
    filter: Option<Filter>,
}

impl Subscriber {
    pub(super) fn new(id: u64, name: String, filter: Option<Filter>) -> (Self, Subscription) {
        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);

        (
            Self {
                id,
                name,
                tx,
                filter,
            },
            Subscription { id, rx },
        )
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }

    pub(super) fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Returns true if the subscriber's filter matches the event. An absent
    /// filter matches everything.
    pub(super) fn matches(&self, event: &Event) -> bool {
        match &self.filter {
            Some(filter) => filter.matches(event),
            None => true,
        }
    }

    /// Sends one bundle into the subscriber's channel without waiting for
    /// its acknowledgement. Fails if the subscriber dropped its channel.
    pub(super) async fn send(&self, events: Vec<Event>) -> Result<(), ()> {
        let (bundle, _ack) = EventBundle::new(events);
        self.tx.send(bundle).await.map_err(|_| ())
    }

    /// Delivers one bundle and waits until the subscriber acknowledges it
    /// (or drops it, which counts as completion). Fails if the subscriber
    /// dropped its channel.
    pub(super) async fn deliver(&self, events: Vec<Event>) -> Result<(), ()> {
        let (bundle, ack) = EventBundle::new(events);
        self.tx.send(bundle).await.map_err(|_| ())?;
        let _ = ack.await;
        Ok(())
    }
}
