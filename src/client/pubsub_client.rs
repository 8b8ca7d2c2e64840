use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use crate::broker::message::ServerMessage;
use crate::broker::ring_buffer::RingBuffer;

/// Capacity of the per-client overflow ring that absorbs bursts when the
/// outbox channel is full.
pub const OVERFLOW_CAPACITY: usize = 100;

/// Represents a client identity in the Pub/Sub system, shared across every
/// topic the client is subscribed to.
///
/// The `outbox` is the bounded channel drained by the client's current
/// connection session. Exactly one live session owns a given client id at a
/// time; when the same id reconnects, the existing state is kept and the
/// outbox is rebound to the new session's channel.
#[derive(Debug)]
pub struct Client {
    /// Client-asserted identifier, bound on the first request of a session.
    pub id: String,

    /// Sender half of the session's outbox channel. Replaced on reconnect,
    /// hence the mutex around the slot rather than around the channel.
    outbox: Mutex<mpsc::Sender<ServerMessage>>,

    /// Secondary drop-oldest buffer holding the most recent delivery events
    /// regardless of outbox state.
    buffer: RingBuffer<ServerMessage>,

    /// Liveness flag; fan-out skips disconnected clients.
    connected: AtomicBool,

    /// Refreshed whenever a delivery is accepted by the outbox.
    last_active: Mutex<DateTime<Utc>>,
}

impl Client {
    /// Creates a new client state bound to `outbox`.
    pub fn new(id: impl Into<String>, outbox: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: id.into(),
            outbox: Mutex::new(outbox),
            buffer: RingBuffer::new(OVERFLOW_CAPACITY),
            connected: AtomicBool::new(true),
            last_active: Mutex::new(Utc::now()),
        }
    }

    /// Rebinds the outbox to a new session's channel and revives the client.
    /// This is the reconnection mechanism: topic memberships survive, only
    /// the delivery channel is replaced.
    pub fn rebind(&self, outbox: mpsc::Sender<ServerMessage>) {
        *self.outbox.lock() = outbox;
        self.connected.store(true, Ordering::Release);
        *self.last_active.lock() = Utc::now();
    }

    /// Delivers a fan-out event: buffers it in the overflow ring, then makes
    /// a non-blocking offer to the outbox. A full outbox loses the offer but
    /// keeps the event in the ring; the publisher is never blocked.
    pub fn deliver(&self, event: ServerMessage) {
        if !self.connected.load(Ordering::Acquire) {
            return;
        }

        self.buffer.push(event.clone());

        match self.outbox.lock().try_send(event) {
            Ok(()) => {
                *self.last_active.lock() = Utc::now();
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(client_id = %self.id, "outbox full, event kept in overflow ring");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Best-effort offer straight to the outbox, bypassing the overflow
    /// ring. Used for one-shot notices such as topic deletion.
    pub fn offer(&self, frame: ServerMessage) {
        let _ = self.outbox.lock().try_send(frame);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.lock()
    }

    /// Snapshot of the most recent `n` events held by the overflow ring.
    pub fn recent_events(&self, n: usize) -> Vec<ServerMessage> {
        self.buffer.last_n(n)
    }

    /// Number of events currently held by the overflow ring.
    pub fn buffered(&self) -> usize {
        self.buffer.size()
    }
}
