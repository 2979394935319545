//! Bounded packet queue between the demuxer and the audio thread.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::core::EncodedPacket;
use crate::playback::control::CancelToken;

/// Result of a blocking dequeue
#[derive(Debug, PartialEq)]
pub enum Pop {
    Packet(EncodedPacket),
    /// The caller's predicate held or cancellation was requested
    Interrupted,
    /// The producer closed the queue and every packet has been taken
    Closed,
}

/// Where the decode loop pulls packets from
pub trait PacketSource: Send + Sync {
    /// Block until a packet is available, `interrupt` returns true, the token
    /// is cancelled or the source is exhausted.
    fn pop_unless(&self, interrupt: &dyn Fn() -> bool, cancel: &CancelToken) -> Pop;

    /// Wake blocked callers so they re-evaluate their predicate
    fn wake_all(&self);
}

#[derive(Debug, Default)]
struct QueueState {
    packets: VecDeque<EncodedPacket>,
    closed: bool,
}

/// Blocking FIFO with a fixed capacity
#[derive(Debug)]
pub struct PacketQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a packet, blocking while the queue is full.
    /// Returns false if the queue was closed or `cancel` fired.
    pub fn push(&self, packet: EncodedPacket, cancel: &CancelToken) -> bool {
        let mut state = self.state.lock();
        while state.packets.len() >= self.capacity && !state.closed && !cancel.is_cancelled() {
            self.not_full.wait(&mut state);
        }
        if state.closed || cancel.is_cancelled() {
            return false;
        }
        state.packets.push_back(packet);
        self.not_empty.notify_one();
        true
    }

    /// Drop every queued packet, as done by the demuxer around a seek
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.packets.clear();
        self.not_full.notify_all();
    }

    /// Mark end of input. Queued packets remain available.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PacketSource for PacketQueue {
    fn pop_unless(&self, interrupt: &dyn Fn() -> bool, cancel: &CancelToken) -> Pop {
        let mut state = self.state.lock();
        loop {
            if cancel.is_cancelled() || interrupt() {
                return Pop::Interrupted;
            }
            if let Some(packet) = state.packets.pop_front() {
                self.not_full.notify_one();
                return Pop::Packet(packet);
            }
            if state.closed {
                return Pop::Closed;
            }
            self.not_empty.wait(&mut state);
        }
    }

    fn wake_all(&self) {
        let _state = self.state.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
