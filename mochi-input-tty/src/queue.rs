//! Bounded event queue between the reader thread and the consumer

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

use mochi_input_parser::ParsedInputEvent;

use crate::error::{Error, Result};

/// Create a queue holding at most `capacity` undelivered events.
///
/// A capacity of zero is raised to one.
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer half, owned by the reader thread
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: SyncSender<ParsedInputEvent>,
}

impl EventSender {
    /// Enqueue an event, blocking while the queue is full
    pub fn send(&self, event: ParsedInputEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::QueueClosed)
    }
}

/// Consumer half
#[derive(Debug)]
pub struct EventReceiver {
    rx: Receiver<ParsedInputEvent>,
}

impl EventReceiver {
    /// Block until an event arrives. `None` once the reader has stopped
    /// and the queue is drained.
    pub fn recv(&self) -> Option<ParsedInputEvent> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for an event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ParsedInputEvent>> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::QueueClosed),
        }
    }

    /// Take an event if one is ready
    pub fn try_recv(&self) -> Result<Option<ParsedInputEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::QueueClosed),
        }
    }

    /// Iterate until the reader stops
    pub fn iter(&self) -> impl Iterator<Item = ParsedInputEvent> + '_ {
        self.rx.iter()
    }
}
