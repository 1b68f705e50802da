//! Core aggregate and domain event traits.

use common::SagaId;
use serde::{de::DeserializeOwned, Serialize};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for serialization and event store filtering.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is rebuilt by replaying events, never loaded directly.
/// `apply` must be pure and deterministic: given the same state and
/// event it always produces the same new state, and it never fails
/// (events represent facts that have already happened).
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<SagaId>;

    /// Returns the number of events applied so far.
    fn version(&self) -> i64;

    /// Sets the aggregate version, used after loading prior events.
    fn set_version(&mut self, version: i64);

    /// Applies an event to the aggregate, updating its state.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
