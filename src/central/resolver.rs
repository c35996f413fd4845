use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

/// A single pending answer from a transport callback.
#[derive(Debug)]
pub(crate) struct Resolver<T>(Option<oneshot::Sender<T>>);

impl<T> Resolver<T> {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn register(&mut self) -> oneshot::Receiver<T> {
        let (sender, receiver) = oneshot::channel();
        self.0 = Some(sender);
        receiver
    }

    pub fn take(&mut self) -> Option<oneshot::Sender<T>> {
        self.0.take()
    }

    pub fn cancel(&mut self) {
        self.0 = None;
    }
}

impl<T> Default for Resolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type SharedResolver<T> = Arc<Mutex<Resolver<T>>>;

/// Delivers `value` to whoever is waiting. Returns false if nobody was.
pub(crate) fn resolve<T>(resolver: &SharedResolver<T>, value: T) -> bool {
    let sender = resolver
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    match sender {
        Some(sender) => sender.send(value).is_ok(),
        None => false,
    }
}
