//! FIFO event queue with a single consumer (the driver).

use super::Event;
use std::collections::VecDeque;
use thiserror::Error;

/// The queue had nothing to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event queue is empty")]
pub struct QueueEmpty;

/// Ordered queue of events.
///
/// Producers push during event handling; the driver pops until `QueueEmpty`
/// before it asks the feed for the next bar.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
    pushed: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail.
    pub fn push(&mut self, event: impl Into<Event>) {
        self.events.push_back(event.into());
        self.pushed += 1;
    }

    /// Take the head, or report `QueueEmpty` without waiting.
    pub fn pop_nonblocking(&mut self) -> Result<Event, QueueEmpty> {
        self.events.pop_front().ok_or(QueueEmpty)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events ever pushed.
    pub fn total_pushed(&self) -> usize {
        self.pushed
    }

    /// Peek at queued events without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}
