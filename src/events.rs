//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - The 250 ms sample clock ISR (a pulse epoch is ready)
//! - The UART driver (GPS bytes waiting)
//! - Software (UI commands, watchdog heartbeat)
//!
//! Events are consumed by the foreground loop, one at a time, in FIFO
//! order.  Payloads never travel through the queue: a `SampleReady`
//! event only says "call `take_sample`".
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Sample ISR  │────▶│              │     │              │
//! │ UART RX     │────▶│  Event Queue │────▶│  Foreground  │
//! │ Software    │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Measurement ───────────────────────────────────────
    /// A pulse epoch was handed off by the sample clock.
    SampleReady = 0,
    /// GPS bytes are waiting in the UART driver.
    GpsRx = 1,

    // ── User input ────────────────────────────────────────
    /// A UI command was queued.
    CommandReceived = 20,

    // ── Housekeeping ──────────────────────────────────────
    /// Watchdog heartbeat.
    WatchdogTick = 50,
}

impl Event {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::SampleReady),
            1 => Some(Self::GpsRx),
            20 => Some(Self::CommandReceived),
            50 => Some(Self::WatchdogTick),
            _ => None,
        }
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// ISRs write (produce), the foreground reads (consume).  One slot is
// kept free to tell full from empty.

pub struct EventQueue {
    head: AtomicU8,
    tail: AtomicU8,
    slots: [AtomicU8; EVENT_QUEUE_CAP],
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            slots: [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP],
            dropped: AtomicU32::new(0),
        }
    }

    /// Push an event.  Safe from ISR context.
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

        if next_head == tail {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.slots[head as usize].store(event as u8, Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    /// Pop the next event.  Single consumer only.
    pub fn pop(&self) -> Option<Event> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);
            if tail == head {
                return None;
            }

            let raw = self.slots[tail as usize].load(Ordering::Relaxed);
            self.tail
                .store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

            // Unknown discriminants are skipped, not returned.
            if let Some(event) = Event::from_u8(raw) {
                return Some(event);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
    }

    /// Events lost to a full queue since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

static EVENTS: EventQueue = EventQueue::new();

/// Push an event into the global queue.  Safe from ISR context.
pub fn push_event(event: Event) -> bool {
    EVENTS.push(event)
}

pub fn pop_event() -> Option<Event> {
    EVENTS.pop()
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

pub fn queue_is_empty() -> bool {
    EVENTS.is_empty()
}

pub fn queue_len() -> usize {
    EVENTS.len()
}

pub fn dropped_events() -> u32 {
    EVENTS.dropped()
}
