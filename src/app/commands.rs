//! Inbound commands to the monitor service.
//!
//! These are the operations the display/UI collaborator can request.  Each
//! is answered with a [`CommandReply`] carrying success or the rejection
//! reason, plus the calibration constant in force afterwards.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use heapless::Deque;

use crate::config::{InputSource, SpeedUnit};
use crate::error::Error;
use crate::events::{Event, push_event};

/// Commands that may wait between two foreground passes.
const INBOX_CAP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    // ── Display ───────────────────────────────────────────────
    SetUnit(SpeedUnit),
    SetAveraging(bool),
    SetInputSource(InputSource),
    ResetDistance,

    // ── Alarm setup ───────────────────────────────────────────
    SetAlarmEnabled(bool),
    /// New threshold in the display unit.
    SetThreshold(f32),
    /// Copy preset 1–4 into the active threshold.
    SelectPreset(usize),
    /// Overwrite preset 1–4.
    SetPreset { index: usize, value: f32 },

    // ── Manual calibration entry ──────────────────────────────
    OpenEntry,
    /// Digit place 0 (units) – 4 (ten-thousands).
    EntryIncrement(usize),
    EntryDecrement(usize),
    EntrySave,
    EntryCancel,

    // ── Field calibration run ─────────────────────────────────
    FieldStart,
    FieldEnd,
    FieldSave,
    FieldCancel,
}

/// Result of one command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandReply {
    pub result: Result<(), Error>,
    /// Calibration constant in force after the command.
    pub calibration: u32,
}

impl CommandReply {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

// ───────────────────────────────────────────────────────────────
// Inbox (UI task → foreground)
// ───────────────────────────────────────────────────────────────

/// Bounded hand-off from whichever task drives the display to the
/// foreground loop.  Each accepted command also queues a
/// [`Event::CommandReceived`] wake-up.
pub struct CommandInbox {
    queue: CriticalSectionMutex<RefCell<Deque<AppCommand, INBOX_CAP>>>,
}

impl CommandInbox {
    pub const fn new() -> Self {
        Self {
            queue: CriticalSectionMutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Returns `false` if the inbox is full and the command was dropped.
    pub fn submit(&self, cmd: AppCommand) -> bool {
        self.queue.lock(|q| q.borrow_mut().push_back(cmd).is_ok())
    }

    pub fn take(&self) -> Option<AppCommand> {
        self.queue.lock(|q| q.borrow_mut().pop_front())
    }
}

impl Default for CommandInbox {
    fn default() -> Self {
        Self::new()
    }
}

static INBOX: CommandInbox = CommandInbox::new();

/// Queue a command for the foreground and wake it.
pub fn submit_command(cmd: AppCommand) -> bool {
    let accepted = INBOX.submit(cmd);
    if accepted {
        push_event(Event::CommandReceived);
    }
    accepted
}

/// Foreground: next queued command, FIFO.
pub fn take_command() -> Option<AppCommand> {
    INBOX.take()
}
