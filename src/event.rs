//! Change events produced by collectors and fanned out to subscribers.

use tokio::sync::oneshot;

use crate::entity::{Entity, EntityID, Kind};

/// One observed change to the entity store.
///
/// `Set` carries the full new value of the entity; `Unset` carries only its
/// identity, since the entity is gone.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Set { source: String, entity: Entity },
    Unset { source: String, id: EntityID },
}

impl Event {
    pub fn set(source: impl Into<String>, entity: Entity) -> Self {
        Event::Set {
            source: source.into(),
            entity,
        }
    }

    pub fn unset(source: impl Into<String>, id: EntityID) -> Self {
        Event::Unset {
            source: source.into(),
            id,
        }
    }

    /// The collector this event originated from.
    pub fn source(&self) -> &str {
        match self {
            Event::Set { source, .. } | Event::Unset { source, .. } => source,
        }
    }

    /// The identity of the affected entity, regardless of variant.
    pub fn entity_id(&self) -> &EntityID {
        match self {
            Event::Set { entity, .. } => entity.id(),
            Event::Unset { id, .. } => id,
        }
    }

    pub fn kind(&self) -> Kind {
        self.entity_id().kind
    }
}

/// A batch of events delivered to one subscriber, plus its completion signal.
///
/// The store delivers at most one bundle per subscriber per notification
/// round and waits for the bundle to be acknowledged before serving the next
/// subscriber. Call [`EventBundle::acknowledge`] as soon as the events have
/// been picked up; holding an unacknowledged bundle stalls the store's
/// fan-out. Dropping the bundle also releases the store, so a crashing
/// subscriber cannot wedge it.
#[derive(Debug)]
pub struct EventBundle {
    pub events: Vec<Event>,
    ack: Option<oneshot::Sender<()>>,
}

impl EventBundle {
    pub(crate) fn new(events: Vec<Event>) -> (Self, oneshot::Receiver<()>) {
        let (ack_tx, ack_rx) = oneshot::channel();
        (
            Self {
                events,
                ack: Some(ack_tx),
            },
            ack_rx,
        )
    }

    /// Signals to the store that this bundle has been picked up.
    ///
    /// Acknowledging more than once is a no-op.
    pub fn acknowledge(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Container;

    #[test]
    fn test_event_accessors() {
        let set = Event::set("kubelet", Entity::Container(Container::new("abc")));
        assert_eq!(set.source(), "kubelet");
        assert_eq!(set.entity_id(), &EntityID::new(Kind::Container, "abc"));
        assert_eq!(set.kind(), Kind::Container);

        let unset = Event::unset("kubelet", EntityID::new(Kind::KubernetesPod, "uid"));
        assert_eq!(unset.entity_id(), &EntityID::new(Kind::KubernetesPod, "uid"));
        assert_eq!(unset.kind(), Kind::KubernetesPod);
    }

    #[tokio::test]
    async fn test_bundle_acknowledge_releases_receiver() {
        let (mut bundle, ack_rx) = EventBundle::new(Vec::new());
        bundle.acknowledge();
        bundle.acknowledge();
        assert!(ack_rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_bundle_drop_releases_receiver() {
        let (bundle, ack_rx) = EventBundle::new(Vec::new());
        drop(bundle);
        // The closed channel is treated as completion by the store.
        assert!(ack_rx.await.is_err());
    }
}
