//! Routes transport push-events to caller handlers, dropping anything that
//! does not belong to the live session's profile, and flags completions for
//! the operation queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{trace, warn};
use uuid::Uuid;

use crate::api::event::{CompletionKind, EventHandler, EventKind, GattEvent};
use crate::api::transport::Transport;
use crate::central::session::SessionView;
use crate::{Error, Result};

/// What the correlator hands the queue when an operation finishes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signal {
    /// Characteristic the event was reported for.
    pub uuid: Uuid,
    pub descriptor: Option<Uuid>,
    pub data: Option<Vec<u8>>,
    pub status: Option<i32>,
}

impl Signal {
    /// True if this completion belongs to an operation on `characteristic`
    /// (and `descriptor`, when the event names one).
    pub fn targets(&self, characteristic: &Uuid, descriptor: Option<&Uuid>) -> bool {
        self.uuid == *characteristic
            && self
                .descriptor
                .as_ref()
                .is_none_or(|reported| Some(reported) == descriptor)
    }
}

/// Completion slots shared by the correlator (writer) and the queue (reader).
#[derive(Debug, Default)]
pub struct Completions {
    slots: [Mutex<Option<Signal>>; 4],
}

impl Completions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, kind: CompletionKind, signal: Signal) {
        *self.slot(kind) = Some(signal);
    }

    /// Consumes the completion for `kind` if one is flagged.
    pub fn take(&self, kind: CompletionKind) -> Option<Signal> {
        self.slot(kind).take()
    }

    pub fn is_set(&self, kind: CompletionKind) -> bool {
        self.slot(kind).is_some()
    }

    fn slot(&self, kind: CompletionKind) -> std::sync::MutexGuard<'_, Option<Signal>> {
        self.slots[kind.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct Correlator {
    inner: Arc<Inner>,
}

struct Inner {
    session: SessionView,
    completions: Arc<Completions>,
    handlers: Mutex<HashMap<EventKind, EventHandler>>,
    attached: AtomicBool,
}

impl Correlator {
    pub fn new(session: SessionView, completions: Arc<Completions>) -> Self {
        Correlator {
            inner: Arc::new(Inner {
                session,
                completions,
                handlers: Mutex::new(HashMap::new()),
                attached: AtomicBool::new(false),
            }),
        }
    }

    pub fn completions(&self) -> &Arc<Completions> {
        &self.inner.completions
    }

    /// Installs one forwarding handler per event kind. No-op if already attached.
    pub fn attach(&self, transport: &dyn Transport) {
        if self.inner.attached.swap(true, Ordering::AcqRel) {
            return;
        }
        for kind in EventKind::ALL {
            let inner = Arc::downgrade(&self.inner);
            let forward: EventHandler = Arc::new(move |event: GattEvent| {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                if let Err(e) = inner.dispatch(kind, event) {
                    warn!("Dropping {:?} event: {}", kind, e);
                }
            });
            transport.on_event(kind, Some(forward));
        }
        trace!("Correlator attached to transport");
    }

    /// Marks the transport-side handlers as gone, e.g. after the transport
    /// disabled all callbacks. The next `attach` re-installs them.
    pub fn detach(&self) {
        self.inner.attached.store(false, Ordering::Release);
    }

    pub fn on(&self, kind: EventKind, handler: EventHandler) {
        self.inner.handlers().insert(kind, handler);
    }

    pub fn off(&self, kind: EventKind) {
        self.inner.handlers().remove(&kind);
    }

    pub fn clear(&self) {
        self.inner.handlers().clear();
    }

    pub fn dispatch(&self, kind: EventKind, event: GattEvent) -> Result<()> {
        self.inner.dispatch(kind, event)
    }
}

impl Inner {
    fn handlers(&self) -> std::sync::MutexGuard<'_, HashMap<EventKind, EventHandler>> {
        self.handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(&self, kind: EventKind, event: GattEvent) -> Result<()> {
        let current = self.session.profile();
        if current != Some(event.profile) {
            trace!(
                "Ignoring {:?} for profile {:?}, current profile {:?}",
                kind, event.profile, current
            );
            return Ok(());
        }

        if let Some(completion) = kind.completion() {
            self.completions.signal(
                completion,
                Signal {
                    uuid: event.uuid,
                    descriptor: event.descriptor,
                    data: event.data.clone(),
                    status: event.status,
                },
            );
        }

        let handler = self.handlers().get(&kind).cloned();
        match handler {
            Some(handler) => {
                handler(event);
                Ok(())
            }
            None => Err(Error::CallbackMissing(format!("{:?}", kind))),
        }
    }
}
