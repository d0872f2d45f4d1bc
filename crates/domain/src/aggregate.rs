//! Core aggregate and domain event traits.

use common::AggregateId;
use document_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events describe what a successful command changed. They are
/// returned to the caller after the write commits and drive notifications,
/// broadcasts and metrics; they are not stored on their own.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;
}

/// Trait for entities persisted as one versioned document.
///
/// Aggregates:
/// - Decide on events from their current state (guard methods)
/// - Apply events to update state (pure, deterministic)
/// - Are written back whole, conditionally on the version they were read at
pub trait Aggregate: Default + Clone + Serialize + DeserializeOwned + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's guards can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the document collection this aggregate lives in.
    fn collection() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the version of the document this state was read from.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the command handler after loading or writing the document.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic and must not fail: the
    /// guard that produced the event already accepted it.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum ShelfEvent {
        Opened { id: AggregateId },
        Counted { units: i32 },
    }

    impl DomainEvent for ShelfEvent {
        fn event_type(&self) -> &'static str {
            match self {
                ShelfEvent::Opened { .. } => "ShelfOpened",
                ShelfEvent::Counted { .. } => "ShelfCounted",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Shelf {
        id: Option<AggregateId>,
        units: i32,
        #[serde(skip)]
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("shelf error")]
    struct ShelfError;

    impl Aggregate for Shelf {
        type Event = ShelfEvent;
        type Error = ShelfError;

        fn collection() -> &'static str {
            "shelves"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                ShelfEvent::Opened { id } => self.id = Some(id),
                ShelfEvent::Counted { units } => self.units = units,
            }
        }
    }

    #[test]
    fn test_aggregate_apply_events() {
        let mut aggregate = Shelf::default();
        let id = AggregateId::new();

        aggregate.apply_events(vec![
            ShelfEvent::Opened { id },
            ShelfEvent::Counted { units: 42 },
        ]);

        assert_eq!(aggregate.id(), Some(id));
        assert_eq!(aggregate.units, 42);
    }

    #[test]
    fn test_version_is_not_part_of_the_body() {
        let mut aggregate = Shelf::default();
        aggregate.set_version(Version::new(7));

        let body = serde_json::to_value(&aggregate).unwrap();
        assert!(body.get("version").is_none());
    }

    #[test]
    fn test_domain_event_type() {
        let event = ShelfEvent::Counted { units: 42 };
        assert_eq!(event.event_type(), "ShelfCounted");
    }
}
