//! Subscriber-side event filtering.

use crate::entity::Kind;
use crate::event::Event;

/// Restricts which events a subscriber receives, by entity kind and event
/// source.
///
/// An empty dimension is open: a filter with no kinds matches every kind, a
/// filter with no sources matches every source. Filters are immutable once
/// built; to change a subscription's filter, unsubscribe and resubscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    kinds: Vec<Kind>,
    sources: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to the given entity kinds.
    #[must_use]
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = Kind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Restricts the filter to events from the given sources.
    #[must_use]
    pub fn sources<S: Into<String>>(mut self, sources: impl IntoIterator<Item = S>) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the filter matches the passed kind.
    pub fn match_kind(&self, kind: Kind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Returns true if the filter matches the passed source.
    pub fn match_source(&self, source: &str) -> bool {
        self.sources.is_empty() || self.sources.iter().any(|s| s == source)
    }

    /// Returns true if the filter matches an event.
    pub fn matches(&self, event: &Event) -> bool {
        self.match_kind(event.kind()) && self.match_source(event.source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Container, Entity};

    const FOO_SOURCE: &str = "foo";
    const BAR_SOURCE: &str = "bar";

    fn container_event() -> Event {
        Event::set(FOO_SOURCE, Entity::Container(Container::new("abc123")))
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = Filter::new();
        assert!(filter.matches(&container_event()));
    }

    #[test]
    fn test_match_single_kind() {
        let filter = Filter::new().kinds([Kind::Container]);
        assert!(filter.matches(&container_event()));
    }

    #[test]
    fn test_match_one_of_kinds() {
        let filter = Filter::new().kinds([Kind::Container, Kind::KubernetesPod]);
        assert!(filter.matches(&container_event()));
    }

    #[test]
    fn test_match_no_kind() {
        let filter = Filter::new().kinds([Kind::KubernetesPod]);
        assert!(!filter.matches(&container_event()));
    }

    #[test]
    fn test_match_single_source() {
        let filter = Filter::new().sources([FOO_SOURCE]);
        assert!(filter.matches(&container_event()));
    }

    #[test]
    fn test_match_one_of_sources() {
        let filter = Filter::new().sources([FOO_SOURCE, BAR_SOURCE]);
        assert!(filter.matches(&container_event()));
    }

    #[test]
    fn test_match_no_source() {
        let filter = Filter::new().sources([BAR_SOURCE]);
        assert!(!filter.matches(&container_event()));
    }

    #[test]
    fn test_match_source_but_not_kind() {
        let filter = Filter::new()
            .kinds([Kind::KubernetesPod])
            .sources([FOO_SOURCE]);
        assert!(!filter.matches(&container_event()));
    }

    #[test]
    fn test_match_kind_but_not_source() {
        let filter = Filter::new().kinds([Kind::Container]).sources([BAR_SOURCE]);
        assert!(!filter.matches(&container_event()));
    }

    #[test]
    fn test_match_both_kind_and_source() {
        let filter = Filter::new().kinds([Kind::Container]).sources([FOO_SOURCE]);
        assert!(filter.matches(&container_event()));
    }

    #[test]
    fn test_unset_events_match_by_kind() {
        use crate::entity::EntityID;

        let filter = Filter::new().kinds([Kind::Container]);
        let unset = Event::unset(FOO_SOURCE, EntityID::new(Kind::Container, "abc123"));
        assert!(filter.matches(&unset));
    }
}
