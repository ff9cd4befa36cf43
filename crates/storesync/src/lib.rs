//! Event-driven synchronization of process-local store mirrors.
//!
//! A process keeps read mirrors of remote data in [`SyncStore`]s. Upstream
//! changes arrive as serialized [`Envelope`]s and are fed to a
//! [`MessageDispatcher`], which routes each one into whichever store is
//! registered for its stream. Producers broadcast their own changes through a
//! [`PublisherHub`] to one or more transport sinks.
//!
//! ```text
//!  producer ──► PublisherHub ──► EventPublisher sinks ──► (transport)
//!
//!  (transport) ──► EventSubscriber ──► DefaultDispatcher ──► SyncStore
//!                                            │
//!                                      StoreRegistry
//! ```
//!
//! # Design Rules
//!
//! 1. At most one store is registered per stream; a later registration
//!    replaces the earlier one atomically.
//! 2. Registration is explicit; constructing a store has no side effects.
//! 3. Malformed or incomplete input is dropped, never raised.
//! 4. A failure (error or panic) inside one store never affects another
//!    store or the dispatch caller.
//! 5. Every call is synchronous on the caller's thread; no ordering is
//!    guaranteed across concurrent dispatches.
//!
//! # Modules
//!
//! - [`store`]: the [`SyncStore`] contract and its type-erased form
//! - [`registry`]: [`StoreRegistry`]
//! - [`dispatcher`]: [`DefaultDispatcher`] and [`DispatchReport`]
//! - [`publisher`]: [`PublisherHub`] and sinks
//! - [`subscriber`]: [`EventSubscriber`]
//! - [`memory`]: [`InMemoryStore`]
//! - [`observer`]: failure observation hooks
//! - [`config`]: [`SyncConfig`]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod observer;
pub mod publisher;
pub mod registry;
pub mod store;
pub mod subscriber;

pub use config::{DispatcherConfig, FailurePolicy, HubConfig, SyncConfig};
pub use dispatcher::{DefaultDispatcher, DispatchReport, DropReason, MessageDispatcher, StoreOutcome};
pub use error::{PublishError, PublishResult, StoreError, StoreResult, SyncError, SyncResult};
pub use memory::{InMemoryStore, JsonDocumentStore};
pub use observer::{DispatchObserver, FailureCounter};
pub use publisher::{BroadcastReport, DispatchingPublisher, EventPublisher, PublisherHub};
pub use registry::{RegistrySnapshot, StoreRegistry};
pub use store::{Applied, RoutableStore, SyncStore};
pub use subscriber::EventSubscriber;

pub use storesync_types::{Envelope, EnvelopeDefect, EventKind, JsonCodec};
