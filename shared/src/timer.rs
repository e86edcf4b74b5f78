//! Owned, cancelable timer handles.
//!
//! The core never sleeps. A [`TimerRegistry`] records which timers are live,
//! when they are due on its virtual clock, and what they are for. Each
//! schedule or cancel is also queued as a [`TimerCommand`] that the app
//! forwards to the shell's platform timers. Firings come back either from the
//! shell or from the virtual clock, and both go through [`TimerRegistry::fire`],
//! which ignores any handle that is no longer live.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

use crate::model::{BatchId, MessageId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(u64);

impl TimerId {
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// What a live timer will do when it fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerPurpose {
    RevealTick(MessageId),
    GracePeriod(BatchId),
}

/// Verdict of a periodic tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Instruction for the shell's platform timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerCommand {
    Schedule { id: TimerId, delay_ms: u64 },
    Cancel { id: TimerId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cadence {
    Once,
    Every(u64),
}

#[derive(Debug)]
struct Entry {
    purpose: TimerPurpose,
    cadence: Cadence,
    due_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: u64,
    now_ms: u64,
    entries: BTreeMap<TimerId, Entry>,
    commands: Vec<TimerCommand>,
}

impl TimerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Periodic timer. Re-armed after each firing whose tick returns
    /// [`Tick::Continue`].
    pub fn schedule(&mut self, interval_ms: u64, purpose: TimerPurpose) -> TimerId {
        self.insert(Cadence::Every(interval_ms), interval_ms, purpose)
    }

    pub fn schedule_once(&mut self, delay_ms: u64, purpose: TimerPurpose) -> TimerId {
        self.insert(Cadence::Once, delay_ms, purpose)
    }

    fn insert(&mut self, cadence: Cadence, delay_ms: u64, purpose: TimerPurpose) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let due_at_ms = self.now_ms.saturating_add(delay_ms);

        trace!(%id, ?purpose, delay_ms, "timer scheduled");
        self.entries.insert(
            id,
            Entry {
                purpose,
                cadence,
                due_at_ms,
            },
        );
        self.commands.push(TimerCommand::Schedule { id, delay_ms });
        id
    }

    /// Idempotent. Returns whether the handle was still live.
    ///
    /// A handle whose schedule has not been drained yet is never announced,
    /// so no cancel is queued for it either.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        if self.entries.remove(&id).is_none() {
            return false;
        }
        trace!(%id, "timer cancelled");
        if !self.forget_queued(id) {
            self.commands.push(TimerCommand::Cancel { id });
        }
        true
    }

    /// Drops a queued schedule for `id`. Returns whether there was one.
    fn forget_queued(&mut self, id: TimerId) -> bool {
        let before = self.commands.len();
        self.commands.retain(
            |command| !matches!(command, TimerCommand::Schedule { id: queued, .. } if *queued == id),
        );
        self.commands.len() != before
    }

    #[must_use]
    pub fn is_live(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    #[must_use]
    pub fn purpose(&self, id: TimerId) -> Option<&TimerPurpose> {
        self.entries.get(&id).map(|e| &e.purpose)
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Runs `tick` for a live handle. Stale handles (already fired or
    /// cancelled) return `None` without running anything.
    ///
    /// One-shot timers are retired before `tick` runs, so the result is always
    /// [`Tick::Stop`] for them.
    pub fn fire<F>(&mut self, id: TimerId, tick: F) -> Option<Tick>
    where
        F: FnOnce(&TimerPurpose) -> Tick,
    {
        let Some(entry) = self.entries.remove(&id) else {
            debug!(%id, "ignoring stale timer firing");
            return None;
        };
        self.now_ms = self.now_ms.max(entry.due_at_ms);
        self.forget_queued(id);

        match entry.cadence {
            Cadence::Once => {
                tick(&entry.purpose);
                Some(Tick::Stop)
            }
            Cadence::Every(interval_ms) => {
                let verdict = tick(&entry.purpose);
                if verdict == Tick::Continue {
                    let due_at_ms = self.now_ms.saturating_add(interval_ms);
                    self.entries.insert(
                        id,
                        Entry {
                            due_at_ms,
                            ..entry
                        },
                    );
                    self.commands.push(TimerCommand::Schedule {
                        id,
                        delay_ms: interval_ms,
                    });
                }
                Some(verdict)
            }
        }
    }

    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Earliest live timer due at or before `until_ms`, ties broken by
    /// scheduling order.
    #[must_use]
    pub fn next_due(&self, until_ms: u64) -> Option<TimerId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.due_at_ms <= until_ms)
            .min_by_key(|(id, e)| (e.due_at_ms, **id))
            .map(|(id, _)| *id)
    }

    /// Moves the virtual clock forward. Never moves it backwards.
    pub fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn drain_commands(&mut self) -> Vec<TimerCommand> {
        std::mem::take(&mut self.commands)
    }
}
