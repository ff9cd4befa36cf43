//! Outbound fan-out of change envelopes.
//!
//! A [`PublisherHub`] wraps a fixed set of [`EventPublisher`] sinks and hands
//! every envelope to each of them. The set is frozen at construction, so
//! broadcasts iterate it without locking. What happens when a sink fails is
//! governed by [`FailurePolicy`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use storesync_types::{Envelope, EventKind, JsonCodec};

use crate::config::{FailurePolicy, HubConfig};
use crate::dispatcher::MessageDispatcher;
use crate::error::{panic_message, PublishError, PublishResult, SyncError, SyncResult};

/// A transport-specific outbound sink.
///
/// The envelope payload is already-encoded JSON text.
pub trait EventPublisher: Send + Sync {
    /// Human-readable sink name used in logs and failure reports.
    fn name(&self) -> &str;

    fn publish(&self, envelope: &Envelope<String>) -> PublishResult<()>;
}

/// Outcome of one broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Sinks that accepted the envelope.
    pub delivered: usize,
    /// Sinks that failed, by name. Only populated under
    /// [`FailurePolicy::Isolate`].
    pub failed: Vec<(String, PublishError)>,
}

impl BroadcastReport {
    /// Returns `true` if no sink failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Broadcasts envelopes to every configured sink.
#[derive(Clone)]
pub struct PublisherHub {
    publishers: Arc<[Arc<dyn EventPublisher>]>,
    config: HubConfig,
}

impl PublisherHub {
    pub fn new(publishers: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self::with_config(publishers, HubConfig::default())
    }

    pub fn with_config(publishers: Vec<Arc<dyn EventPublisher>>, config: HubConfig) -> Self {
        Self {
            publishers: publishers.into(),
            config,
        }
    }

    pub fn publishers(&self) -> &[Arc<dyn EventPublisher>] {
        &self.publishers
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Broadcast an envelope whose payload is already encoded.
    ///
    /// Every sink receives the same envelope. Under
    /// [`FailurePolicy::FailFast`] the first failing sink aborts the broadcast
    /// and sinks after it are not called.
    pub fn send(&self, envelope: &Envelope<String>) -> SyncResult<BroadcastReport> {
        let mut report = BroadcastReport::default();
        for publisher in self.publishers.iter() {
            match publish_guarded(publisher.as_ref(), envelope) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(sink = publisher.name(), stream = %envelope.stream, kind = %envelope.kind, error = %e, "publish failed");
                    if self.config.failure_policy == FailurePolicy::FailFast {
                        return Err(SyncError::Publish {
                            sink: publisher.name().to_string(),
                            source: e,
                        });
                    }
                    report.failed.push((publisher.name().to_string(), e));
                }
            }
        }
        debug!(
            stream = %envelope.stream,
            kind = %envelope.kind,
            delivered = report.delivered,
            failed = report.failed.len(),
            "envelope broadcast"
        );
        Ok(report)
    }

    /// Encode the payload of a typed envelope, then broadcast it.
    pub fn send_envelope<V: Serialize>(&self, envelope: &Envelope<V>) -> SyncResult<BroadcastReport> {
        let payload = JsonCodec::encode(&envelope.payload)?;
        self.send(&Envelope::new(envelope.stream.clone(), envelope.kind, payload))
    }

    /// Build an envelope from its parts and broadcast it.
    pub fn send_event<V: Serialize + ?Sized>(
        &self,
        stream: &str,
        kind: EventKind,
        value: &V,
    ) -> SyncResult<BroadcastReport> {
        let payload = JsonCodec::encode(value)?;
        self.send(&Envelope::new(stream, kind, payload))
    }

    pub fn send_create<V: Serialize + ?Sized>(&self, stream: &str, value: &V) -> SyncResult<BroadcastReport> {
        self.send_event(stream, EventKind::Create, value)
    }

    pub fn send_update<V: Serialize + ?Sized>(&self, stream: &str, value: &V) -> SyncResult<BroadcastReport> {
        self.send_event(stream, EventKind::Update, value)
    }

    pub fn send_delete<V: Serialize + ?Sized>(&self, stream: &str, value: &V) -> SyncResult<BroadcastReport> {
        self.send_event(stream, EventKind::Delete, value)
    }
}

fn publish_guarded(publisher: &dyn EventPublisher, envelope: &Envelope<String>) -> PublishResult<()> {
    panic::catch_unwind(AssertUnwindSafe(|| publisher.publish(envelope)))
        .unwrap_or_else(|p| Err(PublishError::Panicked(panic_message(p.as_ref()))))
}

/// In-process sink that feeds envelopes straight into a dispatcher.
///
/// Useful for mirrors living in the same process as their producer.
/// Envelopes with a blank stream or payload are rejected up front. Dispatch
/// outcomes are logged, never treated as publish failures.
pub struct DispatchingPublisher {
    name: String,
    dispatcher: Arc<dyn MessageDispatcher>,
}

impl DispatchingPublisher {
    pub fn new(name: impl Into<String>, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        Self {
            name: name.into(),
            dispatcher,
        }
    }
}

impl EventPublisher for DispatchingPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, envelope: &Envelope<String>) -> PublishResult<()> {
        if !envelope.is_actionable() {
            return Err(PublishError::Rejected("blank stream or payload".into()));
        }
        let wire = JsonCodec::encode_envelope(envelope)?;
        let report = self.dispatcher.dispatch(&wire);
        debug!(sink = %self.name, applied = report.applied(), failed = report.failed(), "loopback dispatch");
        Ok(())
    }
}
