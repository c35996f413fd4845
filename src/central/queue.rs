//! Strict FIFO of attribute operations with at most one in flight.
//!
//! The transport has a single attribute-operation slot per connection and
//! reports outcomes only through push-events, so the worker issues one call,
//! then polls the shared completion slots until the correlator flags the
//! matching completion or the per-operation deadline passes. Only then is the
//! next operation dequeued.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::ready;
use log::{debug, error, trace, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep};

use crate::api::event::CompletionKind;
use crate::api::operation::{Operation, OperationOutput, WriteType};
use crate::api::transport::{ProfileHandle, Transport};
use crate::central::correlator::Completions;
use crate::central::session::SessionView;
use crate::error::STATUS_CALL_REJECTED;
use crate::{Error, Result};

type Responder = oneshot::Sender<Result<OperationOutput>>;

struct Queued {
    operation: Operation,
    responder: Responder,
}

#[derive(Clone, Copy, Debug)]
pub struct QueueTiming {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Clone)]
pub struct OperationQueue {
    sender: mpsc::UnboundedSender<Queued>,
}

impl OperationQueue {
    /// Starts the drain worker on the current tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        session: SessionView,
        completions: Arc<Completions>,
        timing: QueueTiming,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            transport,
            session,
            completions,
            timing,
        };
        tokio::spawn(worker.drain(receiver));
        OperationQueue { sender }
    }

    /// Appends `operation`. Dropping the returned future before the
    /// operation is dequeued cancels it.
    pub fn enqueue(&self, operation: Operation) -> PendingOperation {
        let (responder, receiver) = oneshot::channel();
        trace!("Enqueue {:?}", operation);
        if let Err(mpsc::error::SendError(queued)) = self.sender.send(Queued {
            operation,
            responder,
        }) {
            let _ = queued.responder.send(Err(Error::QueueClosed));
        }
        PendingOperation { receiver }
    }
}

/// Resolves when the operation's continuation fires.
pub struct PendingOperation {
    receiver: oneshot::Receiver<Result<OperationOutput>>,
}

impl Future for PendingOperation {
    type Output = Result<OperationOutput>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = ready!(Pin::new(&mut self.receiver).poll(cx));
        Poll::Ready(result.unwrap_or(Err(Error::QueueClosed)))
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    session: SessionView,
    completions: Arc<Completions>,
    timing: QueueTiming,
}

impl Worker {
    async fn drain(self, mut receiver: mpsc::UnboundedReceiver<Queued>) {
        while let Some(Queued {
            operation,
            responder,
        }) = receiver.recv().await
        {
            if responder.is_closed() {
                debug!("Skipping cancelled {:?}", operation);
                continue;
            }
            let result = self.run(&operation).await;
            if let Err(e) = &result {
                warn!("{:?} failed: {}", operation, e);
            }
            let _ = responder.send(result);
        }
        debug!("Operation queue closed");
    }

    async fn run(&self, operation: &Operation) -> Result<OperationOutput> {
        let profile = self.profile()?;
        if !self.issue(profile, operation) {
            error!("Transport refused {:?}", operation);
            return Err(Error::rejected(
                STATUS_CALL_REJECTED,
                "transport refused the request",
            ));
        }
        match operation.completion() {
            None => Ok(OperationOutput::Written),
            Some(kind) => self.await_completion(kind, operation).await,
        }
    }

    fn profile(&self) -> Result<ProfileHandle> {
        match self.session.session() {
            None => Err(Error::NotConnected),
            Some(session) => session.profile.ok_or(Error::ProfileNotPrepared),
        }
    }

    fn issue(&self, profile: ProfileHandle, operation: &Operation) -> bool {
        let transport = &self.transport;
        match operation {
            Operation::ReadCharacteristic { characteristic } => {
                transport.read_characteristic(profile, characteristic)
            }
            Operation::WriteCharacteristic {
                characteristic,
                data,
                write_type: WriteType::WithResponse,
            } => transport.write_characteristic(profile, characteristic, data),
            Operation::WriteCharacteristic {
                characteristic,
                data,
                write_type: WriteType::WithoutResponse,
            } => transport.write_characteristic_without_response(profile, characteristic, data),
            Operation::ReadDescriptor {
                characteristic,
                descriptor,
            } => transport.read_descriptor(profile, characteristic, descriptor),
            Operation::WriteDescriptor {
                characteristic,
                descriptor,
                data,
            } => transport.write_descriptor(profile, characteristic, descriptor, data),
        }
    }

    async fn await_completion(
        &self,
        kind: CompletionKind,
        operation: &Operation,
    ) -> Result<OperationOutput> {
        let deadline = Instant::now() + self.timing.timeout;
        loop {
            let signal = self.completions.take(kind).filter(|signal| {
                let ours = signal.targets(operation.characteristic(), operation.descriptor());
                if !ours {
                    warn!(
                        "Discarding {} completion for {} while waiting on {}",
                        kind,
                        signal.uuid,
                        operation.characteristic()
                    );
                }
                ours
            });
            if let Some(signal) = signal {
                return match signal.status {
                    Some(code) if code != 0 => {
                        Err(Error::rejected(code, format!("{} failed", kind)))
                    }
                    _ => Ok(match kind {
                        CompletionKind::CharacteristicRead | CompletionKind::DescriptorRead => {
                            OperationOutput::Value(signal.data.unwrap_or_default())
                        }
                        CompletionKind::CharacteristicWrite | CompletionKind::DescriptorWrite => {
                            OperationOutput::Written
                        }
                    }),
                };
            }
            if Instant::now() >= deadline {
                return Err(Error::OperationTimeout { kind });
            }
            sleep(self.timing.poll_interval).await;
        }
    }
}
