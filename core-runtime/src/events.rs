//! # Event Bus System
//!
//! Provides an event-driven channel between the sync core and the host UI
//! using a broadcast channel.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums for single-game and batch sync
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! Every state transition of a sync job is published here; the host renders
//! job status and message logs from these events instead of reading core
//! state directly.
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ SyncJobRunner├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│  Host UI   │
//! ┌──────────────┐     emit      │ (broadcast│                  └────────────┘
//! │ BatchSession ├──────────────>│  channel) │
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Cancelled {
//!         game_id: "Celeste".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! A lagging subscriber gets `RecvError::Lagged(n)` and keeps receiving.
//! Publishers ignore the "no subscribers" error: a headless run has nobody
//! listening.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Single-game sync job events
    Sync(SyncEvent),
    /// Multi-game batch events
    Batch(BatchEvent),
}

impl CoreEvent {
    /// Whether the event ends a run or a batch.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CoreEvent::Sync(
                SyncEvent::AwaitingConfirmation { .. }
                    | SyncEvent::Completed { .. }
                    | SyncEvent::Failed { .. }
                    | SyncEvent::Cancelled { .. }
            ) | CoreEvent::Batch(BatchEvent::Finished { .. })
        )
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Lifecycle of one game's sync job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A run began; the job's message log was cleared.
    Started {
        game_id: String,
        dry_run: bool,
        /// Run counter of the job, increases with every start.
        run: u64,
    },
    /// New formatted lines were appended to the job's message log.
    Progress { game_id: String, lines: Vec<String> },
    /// A dry run finished and its preview waits for the user.
    AwaitingConfirmation {
        game_id: String,
        /// Number of lines in the preview.
        preview_lines: usize,
    },
    /// A run finished successfully.
    Completed { game_id: String, dry_run: bool },
    /// A run failed; the message is also the last log line.
    Failed {
        game_id: String,
        message: String,
        dry_run: bool,
    },
    /// The job was cancelled by the user.
    Cancelled { game_id: String },
}

impl SyncEvent {
    /// Game the event belongs to.
    pub fn game_id(&self) -> &str {
        match self {
            SyncEvent::Started { game_id, .. }
            | SyncEvent::Progress { game_id, .. }
            | SyncEvent::AwaitingConfirmation { game_id, .. }
            | SyncEvent::Completed { game_id, .. }
            | SyncEvent::Failed { game_id, .. }
            | SyncEvent::Cancelled { game_id } => game_id,
        }
    }
}

// ============================================================================
// Batch Events
// ============================================================================

/// Lifecycle of a multi-game batch session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BatchEvent {
    /// The batch surface was opened and jobs reset.
    Opened { games: usize, selected: usize },
    /// A batch run began.
    Started { total: usize, dry_run: bool },
    /// A queued job is about to start (1-based position).
    JobStarted {
        game_id: String,
        position: usize,
        total: usize,
    },
    /// A queued job settled.
    JobSettled { game_id: String, succeeded: bool },
    /// Cancellation was requested; no further jobs start.
    CancelRequested,
    /// The batch run ended.
    Finished {
        succeeded: usize,
        failed: usize,
        cancelled: bool,
        dry_run: bool,
    },
    /// The checked selection was persisted.
    SelectionSaved { selected: usize },
}

impl BatchEvent {
    /// Game the event belongs to, for per-job batch events.
    pub fn game_id(&self) -> Option<&str> {
        match self {
            BatchEvent::JobStarted { game_id, .. } | BatchEvent::JobSettled { game_id, .. } => {
                Some(game_id)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let batch_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Batch(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only pass events about `game_id`.
    pub fn for_game(self, game_id: impl Into<String>) -> Self {
        let game_id = game_id.into();
        self.filter(move |event| match event {
            CoreEvent::Sync(sync) => sync.game_id() == game_id,
            CoreEvent::Batch(batch) => batch.game_id() == Some(game_id.as_str()),
        })
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.passes(&event) {
                return Ok(event);
            }
        }
    }

    /// Next queued event that passes the filter, without waiting.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.passes(&event) {
                return Some(Ok(event));
            }
        }
    }

    fn passes(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
