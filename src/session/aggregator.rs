//! StreamAggregator — shared per-slot buffers written by many producers,
//! read by one render loop.
//!
//! All slot state and the `changed` latch live under one mutex. The latch is
//! paired with a `Notify` so the reader can sleep until something changes
//! instead of polling. Many writes between two waits coalesce into one wake.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ratatui::style::Color;
use tokio::sync::Notify;

use super::error::{SessionError, SessionResult};

/// Panel accent colours, assigned by `index % PALETTE.len()`.
pub const PALETTE: [Color; 7] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Red,
    Color::White,
];

/// Colour for slot `index`.
pub fn slot_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug)]
struct Slot {
    label: String,
    buffer: String,
    finished: bool,
    color: Color,
}

#[derive(Debug)]
struct SlotTable {
    slots: Vec<Option<Slot>>,
    registered: usize,
    changed: bool,
}

impl SlotTable {
    fn slot_mut(&mut self, index: usize) -> SessionResult<&mut Slot> {
        self.slots
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(SessionError::UnknownSlot(index))
    }
}

/// Point-in-time copy of one registered slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub index: usize,
    pub label: String,
    pub text: String,
    pub color: Color,
    pub done: bool,
}

/// Concurrency-safe per-producer state plus a coalescing change signal.
#[derive(Debug)]
pub struct StreamAggregator {
    total_slots: usize,
    table: Mutex<SlotTable>,
    notify: Notify,
}

impl StreamAggregator {
    /// A session expecting exactly `total_slots` producers.
    pub fn new(total_slots: usize) -> Self {
        Self {
            total_slots,
            table: Mutex::new(SlotTable {
                slots: (0..total_slots).map(|_| None).collect(),
                registered: 0,
                changed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Number of slots registered so far.
    pub fn registered(&self) -> usize {
        self.lock().registered
    }

    fn lock(&self) -> MutexGuard<'_, SlotTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise the latch. Caller holds the table lock.
    fn signal(&self, table: &mut SlotTable) {
        table.changed = true;
        self.notify.notify_one();
    }

    /// Create slot `index` with an empty buffer.
    pub fn register(&self, index: usize, label: impl Into<String>) -> SessionResult<()> {
        let mut table = self.lock();
        let total = self.total_slots;
        let entry = table
            .slots
            .get_mut(index)
            .ok_or(SessionError::SlotOutOfRange { index, total })?;
        if entry.is_some() {
            return Err(SessionError::DuplicateSlot(index));
        }
        *entry = Some(Slot {
            label: label.into(),
            buffer: String::new(),
            finished: false,
            color: slot_color(index),
        });
        table.registered += 1;
        self.signal(&mut table);
        Ok(())
    }

    /// Append `fragment` to slot `index`. Empty fragments are ignored and do
    /// not wake the reader. Appending to a finished slot still appends.
    pub fn append(&self, index: usize, fragment: &str) -> SessionResult<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        let mut table = self.lock();
        table.slot_mut(index)?.buffer.push_str(fragment);
        self.signal(&mut table);
        Ok(())
    }

    /// Mark slot `index` finished. Idempotent.
    pub fn finish(&self, index: usize) -> SessionResult<()> {
        let mut table = self.lock();
        table.slot_mut(index)?.finished = true;
        self.signal(&mut table);
        Ok(())
    }

    /// `append(index, message)` then `finish(index)`, under one lock.
    pub fn fail(&self, index: usize, message: &str) -> SessionResult<()> {
        let mut table = self.lock();
        let slot = table.slot_mut(index)?;
        slot.buffer.push_str(message);
        slot.finished = true;
        self.signal(&mut table);
        Ok(())
    }

    /// Consistent copy of every registered slot, ordered by index.
    pub fn snapshot(&self) -> Vec<PanelView> {
        let table = self.lock();
        table
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|s| PanelView {
                    index,
                    label: s.label.clone(),
                    text: s.buffer.clone(),
                    color: s.color,
                    done: s.finished,
                })
            })
            .collect()
    }

    /// True once every slot is registered and finished.
    pub fn all_done(&self) -> bool {
        let table = self.lock();
        table.registered == self.total_slots
            && table
                .slots
                .iter()
                .all(|s| s.as_ref().is_some_and(|s| s.finished))
    }

    /// Wait until the latch is raised or `timeout` elapses.
    ///
    /// Returns `true` if a change was observed (and clears the latch),
    /// `false` on timeout. A change raised while nobody was waiting makes the
    /// next call return immediately. A wake that finds the latch already
    /// cleared goes back to sleep until the same deadline.
    pub async fn wait_for_change(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register as a waiter before checking the latch so a signal
            // raised in between still wakes us.
            notified.as_mut().enable();

            if self.take_changed() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }

    fn take_changed(&self) -> bool {
        std::mem::take(&mut self.lock().changed)
    }
}
