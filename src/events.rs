//! # Events specification
//!
//! A small synchronous event bus. The upstream implementation this module
//! is modeled on uses an async-std channel; this crate has no async
//! runtime, so the same emit/subscribe shape is built on
//! [`std::sync::mpsc`] instead.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

/// An event surfaced by the peer-state engine for a host application to
/// react to (logging, UI notifications, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An informational message; should not be surfaced to the end user as
    /// a popup or similar.
    Info(String),
    /// A warning; used for degrade events (encryption paused, fingerprint
    /// changed).
    Warning(String),
    /// An error, typically a database failure.
    Error(String),
}

/// Holds the sending half of the event channel plus a template to hand out
/// fresh receivers to subscribers.
pub struct Events {
    sender: Sender<Event>,
    receiver: Mutex<Option<Receiver<Event>>>,
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events").finish_non_exhaustive()
    }
}

impl Default for Events {
    fn default() -> Self {
        let (sender, receiver) = std::sync::mpsc::channel();
        Events {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

impl Events {
    pub fn emit(&self, event: Event) {
        // A disconnected receiver (no one is listening) is not an error for
        // the emitting side; dropping the event is correct in that case.
        let _ = self.sender.send(event);
    }

    /// Retrieve the event emitter. May only be called once per `Events`
    /// instance, matching the single-reader nature of `mpsc::Receiver`.
    pub fn get_emitter(&self) -> EventEmitter {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("event emitter already taken");
        EventEmitter(receiver)
    }
}

#[derive(Debug)]
pub struct EventEmitter(Receiver<Event>);

impl EventEmitter {
    /// Blocking receive of the next event; returns `None` once the sender
    /// side has been dropped.
    pub fn recv(&self) -> Option<Event> {
        self.0.recv().ok()
    }

    /// Drains all events currently queued without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.0.try_iter()
    }
}
