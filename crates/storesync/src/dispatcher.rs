//! Routes inbound change envelopes into registered stores.
//!
//! Each call to [`MessageDispatcher::dispatch`] is a self-contained,
//! synchronous unit of work:
//!
//! ```text
//! RECEIVED ─► ENVELOPE_DECODED ─► for each matching store:
//!                                   PAYLOAD_DECODED ─► ROUTED
//!                                 ─► DONE
//! ```
//!
//! The first decode reads only `dataSource` and `eventType` and keeps `data`
//! opaque, so messages for streams nobody subscribes to never pay for a full
//! payload decode. Malformed or incomplete input is dropped silently.
//! Failures inside one store are contained to that store.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use storesync_types::{Envelope, EnvelopeDefect, EventKind, JsonCodec};

use crate::config::DispatcherConfig;
use crate::error::{panic_message, StoreError};
use crate::observer::DispatchObserver;
use crate::registry::{RegistrySnapshot, StoreRegistry};
use crate::store::{Applied, RoutableStore};

/// Why a message never reached any store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The raw message was empty, whitespace, or a JSON `null`.
    Blank,
    /// No store is registered at all.
    NoStores,
    /// The raw bytes were not UTF-8.
    NotUtf8,
    /// The message was not a decodable envelope.
    Undecodable(String),
    /// The envelope lacked a routing field.
    Incomplete(EnvelopeDefect),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "blank message"),
            Self::NoStores => write!(f, "no stores registered"),
            Self::NotUtf8 => write!(f, "message is not UTF-8"),
            Self::Undecodable(e) => write!(f, "undecodable envelope: {e}"),
            Self::Incomplete(defect) => write!(f, "incomplete envelope: {defect}"),
        }
    }
}

/// Result of routing to one store.
#[derive(Debug)]
pub enum StoreOutcome {
    Applied(Applied),
    Failed(StoreError),
}

/// What a single dispatch call did.
///
/// Callers must not treat this as an acknowledgement protocol; it exists so
/// tests and operators can see outcomes that the fail-open policy would
/// otherwise hide.
#[derive(Debug)]
pub enum DispatchReport {
    Dropped(DropReason),
    Routed {
        stream: String,
        kind: EventKind,
        outcomes: Vec<StoreOutcome>,
    },
}

impl DispatchReport {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }

    pub fn drop_reason(&self) -> Option<&DropReason> {
        match self {
            Self::Dropped(reason) => Some(reason),
            Self::Routed { .. } => None,
        }
    }

    /// Per-store outcomes; empty when dropped.
    pub fn outcomes(&self) -> &[StoreOutcome] {
        match self {
            Self::Dropped(_) => &[],
            Self::Routed { outcomes, .. } => outcomes,
        }
    }

    /// The envelope decoded but no registered store subscribes to its stream.
    pub fn is_unmatched(&self) -> bool {
        matches!(self, Self::Routed { outcomes, .. } if outcomes.is_empty())
    }

    /// Number of stores whose mutation hook ran successfully.
    pub fn applied(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|o| matches!(o, StoreOutcome::Applied(a) if *a != Applied::PayloadAbsent))
            .count()
    }

    /// Number of stores that skipped the message because the payload
    /// decoded to nothing.
    pub fn skipped(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|o| matches!(o, StoreOutcome::Applied(Applied::PayloadAbsent)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|o| matches!(o, StoreOutcome::Failed(_)))
            .count()
    }
}

/// Consumes raw serialized envelopes.
pub trait MessageDispatcher: Send + Sync {
    fn dispatch(&self, raw: &str) -> DispatchReport;

    fn dispatch_bytes(&self, raw: &[u8]) -> DispatchReport {
        match std::str::from_utf8(raw) {
            Ok(text) => self.dispatch(text),
            Err(_) => DispatchReport::Dropped(DropReason::NotUtf8),
        }
    }
}

/// Dispatcher over a [`StoreRegistry`].
pub struct DefaultDispatcher {
    registry: Arc<StoreRegistry>,
    config: DispatcherConfig,
    observer: Option<Arc<dyn DispatchObserver>>,
}

impl DefaultDispatcher {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self::with_config(registry, DispatcherConfig::default())
    }

    pub fn with_config(registry: Arc<StoreRegistry>, config: DispatcherConfig) -> Self {
        Self {
            registry,
            config,
            observer: None,
        }
    }

    /// Attach an observer notified of drops and per-store failures.
    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Dispatch `raw` against an explicit set of stores.
    ///
    /// Every store in `snapshot` whose identity equals the envelope's stream
    /// is routed to, in snapshot order. A store replaced in the registry
    /// after the snapshot was taken still finishes on the stale reference.
    pub fn dispatch_to(&self, snapshot: &RegistrySnapshot, raw: &str) -> DispatchReport {
        if raw.trim().is_empty() {
            return self.dropped(DropReason::Blank);
        }
        if snapshot.is_empty() {
            return self.dropped(DropReason::NoStores);
        }

        let raw_envelope = match JsonCodec::decode_envelope(raw) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return self.dropped(DropReason::Blank),
            Err(e) => return self.dropped(DropReason::Undecodable(e.to_string())),
        };
        let envelope = match raw_envelope.into_actionable() {
            Ok(envelope) => envelope,
            Err(defect) => return self.dropped(DropReason::Incomplete(defect)),
        };

        let outcomes: Vec<StoreOutcome> = snapshot
            .matching(&envelope.stream)
            .map(|store| self.route(store.as_ref(), &envelope))
            .collect();
        if outcomes.is_empty() {
            debug!(stream = %envelope.stream, "no store subscribes to stream");
        }

        DispatchReport::Routed {
            stream: envelope.stream,
            kind: envelope.kind,
            outcomes,
        }
    }

    fn dropped(&self, reason: DropReason) -> DispatchReport {
        debug!(reason = %reason, "message dropped");
        if let Some(observer) = &self.observer {
            observer.on_dropped(&reason);
        }
        DispatchReport::Dropped(reason)
    }

    fn route(&self, store: &dyn RoutableStore, envelope: &Envelope<String>) -> StoreOutcome {
        let apply = || store.apply(envelope.kind, &envelope.payload);
        let result = if self.config.catch_panics {
            panic::catch_unwind(AssertUnwindSafe(apply))
                .unwrap_or_else(|p| Err(StoreError::Panicked(panic_message(p.as_ref()))))
        } else {
            apply()
        };

        match result {
            Ok(applied) => {
                debug!(stream = %envelope.stream, kind = %envelope.kind, ?applied, "envelope routed");
                StoreOutcome::Applied(applied)
            }
            Err(e) => {
                warn!(stream = %envelope.stream, kind = %envelope.kind, error = %e, "store failed to apply envelope");
                if let Some(observer) = &self.observer {
                    observer.on_store_failure(&envelope.stream, &e);
                }
                StoreOutcome::Failed(e)
            }
        }
    }
}

impl MessageDispatcher for DefaultDispatcher {
    fn dispatch(&self, raw: &str) -> DispatchReport {
        self.dispatch_to(&self.registry.snapshot(), raw)
    }

    fn dispatch_bytes(&self, raw: &[u8]) -> DispatchReport {
        match std::str::from_utf8(raw) {
            Ok(text) => self.dispatch(text),
            Err(_) => self.dropped(DropReason::NotUtf8),
        }
    }
}
