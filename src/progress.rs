//! Progress broadcasting with replay
//!
//! Each job owns an append-only [`EventLog`]. Publishing appends under a short
//! lock and bumps a `watch` counter, so the job task never waits on observers.
//! Every [`Subscription`] keeps its own cursor into the log: it first replays
//! everything published so far, then follows new events, and ends right after
//! the terminal event. Observers that attach late, reconnect, or read slowly
//! all see the complete, ordered history.
//!
//! Memory grows with the number of events of a job (a few per photo), which is
//! bounded by the work plan and released when the job is evicted.

use crate::types::Event;
use futures::Stream;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Default)]
struct LogState {
    events: Vec<Event>,
    closed: bool,
}

/// Append-only, replayable event log of one job
pub struct EventLog {
    state: Mutex<LogState>,
    len_tx: watch::Sender<usize>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        let (len_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(LogState::default()),
            len_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        // a poisoned log still holds valid events; keep serving them
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an event and wake subscribers
    ///
    /// The first terminal event closes the log. Anything published after it is
    /// dropped and `false` is returned.
    pub fn publish(&self, event: Event) -> bool {
        let len = {
            let mut state = self.lock();
            if state.closed {
                tracing::debug!(kind = event.kind(), "event after terminal event dropped");
                return false;
            }
            state.closed = event.is_terminal();
            state.events.push(event);
            state.events.len()
        };
        self.len_tx.send_replace(len);
        true
    }

    /// Start observing from the beginning of the log
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        Subscription {
            log: Arc::clone(self),
            cursor: 0,
            len_rx: self.len_tx.subscribe(),
        }
    }

    /// Copy of every event published so far
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Number of events published so far
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Whether nothing was published yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the terminal event has been published
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Event at `index`, or whether the log is closed when there is none yet
    fn get(&self, index: usize) -> Result<Event, bool> {
        let state = self.lock();
        state.events.get(index).cloned().ok_or(state.closed)
    }
}

/// One observer's position in an [`EventLog`]
///
/// Dropping a subscription has no effect on the job or on other observers.
pub struct Subscription {
    log: Arc<EventLog>,
    cursor: usize,
    len_rx: watch::Receiver<usize>,
}

impl Subscription {
    /// Next event in order, or `None` once the terminal event was delivered
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.log.get(self.cursor) {
                Ok(event) => {
                    self.cursor += 1;
                    return Some(event);
                }
                Err(true) => return None,
                Err(false) => {
                    // the sender lives inside the log we hold, so this only
                    // fails if the log is being torn down
                    if self.len_rx.changed().await.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Number of events already delivered to this subscriber
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Turn the subscription into a stream ending after the terminal event
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.next().await?;
            Some((event, subscription))
        })
    }
}
