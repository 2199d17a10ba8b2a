//! Connection identity and the handle shared with the registry and the
//! liveness monitor.
//!
//! A [`ConnectionHandle`] is the only thing other components hold of a
//! connection. The socket itself stays owned by the connection task, which
//! drains the paired [`ConnectionMailbox`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc};

/// Unique identifier for one accepted WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame queued for a connection's writer half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized chat payload sent as a text frame.
    Text(String),
    /// Liveness check sent as a WebSocket ping.
    Ping,
}

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound queue is full.
    #[error("outbound queue full")]
    Full,
    /// The connection task has already exited.
    #[error("connection closed")]
    Closed,
}

/// Cloneable reference to a live connection.
///
/// Holds the sending side of the connection's outbound queue, its liveness
/// flag and its termination signal. Cloning is cheap; all clones refer to
/// the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Outbound>,
    alive: Arc<AtomicBool>,
    terminate: Arc<Notify>,
}

/// Receiving side owned by the connection task.
#[derive(Debug)]
pub struct ConnectionMailbox {
    /// Frames to write to the socket.
    pub frames: mpsc::Receiver<Outbound>,
    /// Fires when another component asks for the connection to be dropped.
    pub terminate: Arc<Notify>,
}

impl ConnectionHandle {
    /// Creates a handle for a new connection with an outbound queue of
    /// `buffer` frames. The connection starts out alive.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, ConnectionMailbox) {
        let (outbound, frames) = mpsc::channel(buffer.max(1));
        let terminate = Arc::new(Notify::new());
        let handle = Self {
            id: ConnectionId::new(),
            outbound,
            alive: Arc::new(AtomicBool::new(true)),
            terminate: Arc::clone(&terminate),
        };
        (handle, ConnectionMailbox { frames, terminate })
    }

    /// Returns the connection's id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Full`] if the queue is at capacity and
    /// [`DeliveryError::Closed`] if the connection task has exited.
    pub fn send(&self, frame: Outbound) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Records a ping acknowledgement.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Clears the liveness flag and returns whether it was set.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    /// Asks the connection task to drop the connection.
    pub fn terminate(&self) {
        self.terminate.notify_one();
    }

    /// Returns `true` once the connection task has dropped its mailbox.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}
