//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use document_store::{Document, DocumentQuery, DocumentStore, DocumentStoreError, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// Number of times a command is re-run after losing a version race.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 32;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The version of the document after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Returns true if the command changed nothing.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Handler for executing commands against aggregates.
///
/// Every command is one atomic find-and-update:
/// 1. Load the document and rebuild the aggregate
/// 2. Run the guard to produce events (or reject)
/// 3. Apply the events
/// 4. Write the document back only if it is still at the version read in step 1
///
/// When step 4 loses a race the whole sequence is re-run against the fresh
/// state, so a guard is always evaluated against the state it overwrites.
pub struct CommandHandler<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    store: S,
    max_attempts: u32,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: DocumentStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            max_attempts: self.max_attempts,
            _phantom: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given document store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            _phantom: PhantomData,
        }
    }

    /// Overrides how many conflicting writes a command tolerates.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Returns a reference to the underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load(&self, id: AggregateId) -> Result<Option<A>, DomainError> {
        match self.store.get(A::collection(), id).await? {
            Some(document) => Ok(Some(Self::hydrate(&document)?)),
            None => Ok(None),
        }
    }

    /// Loads an aggregate, failing with `NotFound` if it doesn't exist.
    pub async fn load_existing(&self, id: AggregateId) -> Result<A, DomainError> {
        self.load(id).await?.ok_or(DomainError::NotFound {
            collection: A::collection(),
            id,
        })
    }

    /// Returns every aggregate matching the query.
    pub async fn find(&self, query: DocumentQuery) -> Result<Vec<A>, DomainError> {
        self.store
            .find(query)
            .await?
            .iter()
            .map(Self::hydrate)
            .collect()
    }

    /// Creates a new aggregate under `id`.
    ///
    /// The command function runs against a default aggregate. Fails with a
    /// storage `AlreadyExists` error if the id is taken.
    pub async fn create<F>(
        &self,
        id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = A::default();
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: Version::initial(),
            });
        }

        aggregate.apply_events(events.iter().cloned());
        let stored = self
            .store
            .insert(Document::from_state(A::collection(), id, &aggregate)?)
            .await?;
        aggregate.set_version(stored.version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version: stored.version,
        })
    }

    /// Executes a command against an existing aggregate.
    ///
    /// Fails with `NotFound` if the aggregate doesn't exist. The command
    /// function may run several times if concurrent writers interleave.
    pub async fn execute<F>(
        &self,
        id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(id, false, command_fn).await
    }

    /// Executes a command, starting from a default aggregate if none exists yet.
    pub async fn execute_or_create<F>(
        &self,
        id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(id, true, command_fn).await
    }

    /// Deletes an aggregate, optionally only if it is still at `expected`.
    pub async fn delete(
        &self,
        id: AggregateId,
        expected: Option<Version>,
    ) -> Result<bool, DomainError> {
        Ok(self.store.delete(A::collection(), id, expected).await?)
    }

    async fn run<F>(
        &self,
        id: AggregateId,
        create_missing: bool,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let collection = A::collection();

        for attempt in 1..=self.max_attempts {
            let (mut aggregate, current) = match self.store.get(collection, id).await? {
                Some(document) => (Self::hydrate(&document)?, Some(document)),
                None if create_missing => (A::default(), None),
                None => return Err(DomainError::NotFound { collection, id }),
            };

            let events = command_fn(&aggregate)?;
            if events.is_empty() {
                let new_version = aggregate.version();
                return Ok(CommandResult {
                    aggregate,
                    events,
                    new_version,
                });
            }

            aggregate.apply_events(events.iter().cloned());

            let written = match current {
                Some(document) => {
                    let expected = document.version;
                    self.store
                        .replace(document.with_state(&aggregate)?, expected)
                        .await
                }
                None => {
                    self.store
                        .insert(Document::from_state(collection, id, &aggregate)?)
                        .await
                }
            };

            match written {
                Ok(stored) => {
                    aggregate.set_version(stored.version);
                    return Ok(CommandResult {
                        aggregate,
                        events,
                        new_version: stored.version,
                    });
                }
                Err(
                    DocumentStoreError::ConcurrencyConflict { .. }
                    | DocumentStoreError::AlreadyExists { .. }
                    | DocumentStoreError::NotFound { .. },
                ) => {
                    metrics::counter!("document_conflicts_total", "collection" => collection)
                        .increment(1);
                    tracing::debug!(collection, %id, attempt, "lost write race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            collection,
            %id,
            attempts = self.max_attempts,
            "giving up after repeated write conflicts"
        );
        Err(DomainError::ContentionExhausted {
            collection,
            id,
            attempts: self.max_attempts,
        })
    }

    fn hydrate(document: &Document) -> Result<A, DomainError> {
        let mut aggregate: A = document.to_state()?;
        aggregate.set_version(document.version);
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::aggregate::DomainEvent;
    use document_store::InMemoryDocumentStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: AggregateId },
        Incremented,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Incremented => "CounterIncremented",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        value: u32,
        limit: u32,
        #[serde(skip)]
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    enum CounterError {
        #[error("limit reached")]
        LimitReached,
    }

    impl From<CounterError> for DomainError {
        fn from(_: CounterError) -> Self {
            DomainError::NotFound {
                collection: "counters",
                id: AggregateId::new(),
            }
        }
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn collection() -> &'static str {
            "counters"
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
                CounterEvent::Opened { id } => {
                    self.id = Some(id);
                    self.limit = 10;
                }
                CounterEvent::Incremented => self.value += 1,
            }
        }
    }

    impl Counter {
        fn increment(&self) -> Result<Vec<CounterEvent>, CounterError> {
            if self.value >= self.limit {
                return Err(CounterError::LimitReached);
            }
            Ok(vec![CounterEvent::Incremented])
        }
    }

    fn handler(store: InMemoryDocumentStore) -> CommandHandler<InMemoryDocumentStore, Counter> {
        CommandHandler::new(store)
    }

    #[tokio::test]
    async fn test_create_inserts_first_version() {
        let handler = handler(InMemoryDocumentStore::new());
        let id = AggregateId::new();

        let result = handler
            .create(id, |_| Ok(vec![CounterEvent::Opened { id }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.id(), Some(id));
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let handler = handler(InMemoryDocumentStore::new());
        let id = AggregateId::new();

        handler
            .create(id, |_| Ok(vec![CounterEvent::Opened { id }]))
            .await
            .unwrap();
        let result = handler
            .create(id, |_| Ok(vec![CounterEvent::Opened { id }]))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Store(DocumentStoreError::AlreadyExists { .. }))
        ));
    }

    #[tokio::test]
    async fn test_execute_missing_is_not_found() {
        let handler = handler(InMemoryDocumentStore::new());
        let result = handler.execute(AggregateId::new(), Counter::increment).await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_execute_or_create_starts_from_default() {
        let store = InMemoryDocumentStore::new();
        let handler = handler(store.clone());
        let id = AggregateId::new();

        let result = handler
            .execute_or_create(id, |_| Ok(vec![CounterEvent::Incremented]))
            .await
            .unwrap();

        assert_eq!(result.aggregate.value, 1);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_events_returns_without_writing() {
        let handler = handler(InMemoryDocumentStore::new());
        let id = AggregateId::new();
        handler
            .create(id, |_| Ok(vec![CounterEvent::Opened { id }]))
            .await
            .unwrap();

        let result = handler.execute(id, |_| Ok(vec![])).await.unwrap();

        assert!(result.is_noop());
        assert_eq!(result.new_version, Version::first());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commands_never_lose_updates() {
        let handler = Arc::new(handler(InMemoryDocumentStore::new()));
        let id = AggregateId::new();
        handler
            .create(id, |_| Ok(vec![CounterEvent::Opened { id }]))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..25)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.execute(id, Counter::increment).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }

        let counter = handler.load_existing(id).await.unwrap();
        assert_eq!(successes, 10);
        assert_eq!(counter.value, 10);
    }
}
