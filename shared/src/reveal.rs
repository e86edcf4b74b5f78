//! Incremental reveal of an already received reply.
//!
//! [`RevealSession`] is the pure state machine (`Idle -> Revealing -> Idle`),
//! advanced one character per [`RevealSession::tick`]. [`RevealScheduler`]
//! binds sessions to timer handles so a message never has two reveal timers
//! at once, and [`RevealEventBus`] fans the resulting events out to readers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::model::MessageId;
use crate::timer::{Tick, TimerId, TimerPurpose, TimerRegistry};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealEvent {
    /// The visible prefix grew by one character.
    Progress {
        target: MessageId,
        visible_text: String,
    },
    /// Natural completion. Never sent for an interrupted session.
    Completed { target: MessageId, text: String },
}

impl RevealEvent {
    #[must_use]
    pub const fn target(&self) -> MessageId {
        match self {
            Self::Progress { target, .. } | Self::Completed { target, .. } => *target,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Progress { visible_text, .. } => visible_text,
            Self::Completed { text, .. } => text,
        }
    }
}

/// Result of one tick: what to publish and whether the timer keeps running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub events: Vec<RevealEvent>,
    pub next: Tick,
}

impl Transition {
    fn halt() -> Self {
        Self {
            events: Vec::new(),
            next: Tick::Stop,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevealSession {
    target: Option<MessageId>,
    full_text: String,
    /// Characters revealed so far.
    cursor: usize,
    /// Byte offset of `cursor` inside `full_text`.
    byte_pos: usize,
    char_len: usize,
    active: bool,
}

impl RevealSession {
    /// Resets the cursor and arms the session for `full_text`.
    ///
    /// Empty text completes on the spot: the session stays idle and the
    /// completion event is returned instead of waiting for a tick.
    pub fn begin(&mut self, target: MessageId, full_text: String) -> Option<RevealEvent> {
        self.char_len = full_text.chars().count();
        self.target = Some(target);
        self.full_text = full_text;
        self.cursor = 0;
        self.byte_pos = 0;
        self.active = self.char_len > 0;

        (!self.active).then(|| RevealEvent::Completed {
            target,
            text: String::new(),
        })
    }

    /// Advances by one character. A text of N characters takes exactly N
    /// ticks; the last one also carries the completion event.
    pub fn tick(&mut self) -> Transition {
        let Some(target) = self.target.filter(|_| self.active) else {
            return Transition::halt();
        };

        let mut events = Vec::with_capacity(2);
        if let Some(ch) = self.full_text[self.byte_pos..].chars().next() {
            self.byte_pos += ch.len_utf8();
            self.cursor += 1;
            events.push(RevealEvent::Progress {
                target,
                visible_text: self.full_text[..self.byte_pos].to_string(),
            });
        }

        if self.cursor >= self.char_len {
            self.active = false;
            events.push(RevealEvent::Completed {
                target,
                text: self.full_text.clone(),
            });
            Transition {
                events,
                next: Tick::Stop,
            }
        } else {
            Transition {
                events,
                next: Tick::Continue,
            }
        }
    }

    /// Returns whether the session was revealing.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn target(&self) -> Option<MessageId> {
        self.target
    }

    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    #[must_use]
    pub fn visible_text(&self) -> &str {
        &self.full_text[..self.byte_pos]
    }

    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.char_len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.char_len == 0
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

/// A session stopped before it finished, with the text its reader may want
/// to show in full.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interrupted {
    pub target: MessageId,
    pub full_text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Started {
    /// Other sessions stopped to make room (exclusive mode).
    pub interrupted: Vec<Interrupted>,
    /// Set when the text was empty and the session completed immediately.
    pub completed: Option<RevealEvent>,
}

#[derive(Debug, Default)]
struct Slot {
    session: RevealSession,
    timer: Option<TimerId>,
}

impl Slot {
    fn halt(&mut self, timers: &mut TimerRegistry) -> Option<Interrupted> {
        if let Some(timer) = self.timer.take() {
            timers.cancel(timer);
        }
        let target = self.session.target()?;
        self.session.stop().then(|| Interrupted {
            target,
            full_text: self.session.full_text().to_string(),
        })
    }
}

/// Reveal sessions keyed by the message they fill in.
#[derive(Debug)]
pub struct RevealScheduler {
    cadence_ms: u64,
    exclusive: bool,
    slots: BTreeMap<MessageId, Slot>,
}

impl RevealScheduler {
    #[must_use]
    pub fn new(cadence_ms: u64, exclusive: bool) -> Self {
        Self {
            cadence_ms,
            exclusive,
            slots: BTreeMap::new(),
        }
    }

    /// Restart is stop-then-start: any timer already bound to `target` is
    /// cancelled before the new one is scheduled.
    pub fn start(
        &mut self,
        target: MessageId,
        full_text: impl Into<String>,
        timers: &mut TimerRegistry,
    ) -> Started {
        let mut started = Started::default();

        if self.exclusive {
            let others: Vec<MessageId> =
                self.slots.keys().copied().filter(|id| *id != target).collect();
            for other in others {
                if let Some(mut slot) = self.slots.remove(&other) {
                    started.interrupted.extend(slot.halt(timers));
                }
            }
        }

        let slot = self.slots.entry(target).or_default();
        if slot.halt(timers).is_some() {
            debug!(%target, "restarting reveal");
        }

        let full_text = full_text.into();
        let len = full_text.len();
        started.completed = slot.session.begin(target, full_text);
        if started.completed.is_none() {
            slot.timer = Some(timers.schedule(self.cadence_ms, TimerPurpose::RevealTick(target)));
            info!(%target, bytes = len, "reveal started");
        }

        started
    }

    /// Advances `target`'s session on behalf of `timer`. A tick from any timer
    /// other than the one currently bound to the session halts that timer.
    pub fn tick(&mut self, target: MessageId, timer: TimerId) -> Transition {
        let Some(slot) = self.slots.get_mut(&target) else {
            warn!(%target, %timer, "tick for unknown reveal session");
            return Transition::halt();
        };
        if slot.timer != Some(timer) {
            warn!(%target, %timer, "tick from a superseded reveal timer");
            return Transition::halt();
        }

        let transition = slot.session.tick();
        if transition.next == Tick::Stop {
            slot.timer = None;
            debug!(%target, "reveal complete");
        }
        transition
    }

    pub fn stop(&mut self, target: MessageId, timers: &mut TimerRegistry) -> Option<Interrupted> {
        let interrupted = self.slots.get_mut(&target)?.halt(timers);
        if interrupted.is_some() {
            info!(%target, "reveal stopped");
        }
        interrupted
    }

    pub fn stop_all(&mut self, timers: &mut TimerRegistry) -> Vec<Interrupted> {
        let targets: Vec<MessageId> = self.slots.keys().copied().collect();
        targets
            .into_iter()
            .filter_map(|target| self.stop(target, timers))
            .collect()
    }

    /// Stops `target` and forgets its text and cursor.
    pub fn reset(&mut self, target: MessageId, timers: &mut TimerRegistry) {
        if let Some(mut slot) = self.slots.remove(&target) {
            slot.halt(timers);
        }
    }

    pub fn reset_all(&mut self, timers: &mut TimerRegistry) {
        for (_, mut slot) in std::mem::take(&mut self.slots) {
            slot.halt(timers);
        }
    }

    #[must_use]
    pub fn session(&self, target: MessageId) -> Option<&RevealSession> {
        self.slots.get(&target).map(|slot| &slot.session)
    }

    #[must_use]
    pub fn active_targets(&self) -> Vec<MessageId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.session.is_active())
            .map(|(id, _)| *id)
            .collect()
    }

    #[must_use]
    pub fn is_revealing(&self) -> bool {
        self.slots.values().any(|slot| slot.session.is_active())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Reader side of the bus. Dropping it unsubscribes on the next publish.
#[derive(Debug)]
pub struct RevealSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<RevealEvent>,
}

impl RevealSubscription {
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn try_next(&mut self) -> Option<RevealEvent> {
        self.receiver.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<RevealEvent> {
        self.receiver.recv().await
    }

    pub fn drain(&mut self) -> Vec<RevealEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

/// One writer, many readers, in-order delivery to each reader.
#[derive(Debug, Default)]
pub struct RevealEventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<RevealEvent>)>,
}

impl RevealEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> RevealSubscription {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push((id, sender));
        RevealSubscription { id, receiver }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    /// Returns the number of readers the event reached.
    pub fn publish(&mut self, event: &RevealEvent) -> usize {
        self.subscribers
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());
        self.subscribers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
