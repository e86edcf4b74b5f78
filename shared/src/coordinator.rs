//! The deferred action coordinator.
//!
//! Owns the timer registry, the reveal sessions and their event bus, the
//! chat and recipe stores, and the delete queue. Everything that mutates a
//! store goes through here so the pending-delete and reveal invariants hold.
//! One instance lives in the app [`Model`](crate::Model); tests build their
//! own.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::delete_queue::{CommitOutcome, DeleteBatch, DeleteCommand, DeleteQueue};
use crate::error::{ApiError, ConfigError, CoordinatorError};
use crate::list_store::ListStore;
use crate::model::{
    BatchId, ChatMessage, MessageId, MessageStatus, Recipe, RecipeId, RecipeUpdate, Role,
};
use crate::reveal::{
    Interrupted, RevealEvent, RevealEventBus, RevealScheduler, RevealSession, RevealSubscription,
    SubscriptionId,
};
use crate::timer::{Tick, TimerCommand, TimerId, TimerPurpose, TimerRegistry};

#[derive(Debug)]
pub struct DeferredActionCoordinator {
    config: CoordinatorConfig,
    timers: TimerRegistry,
    reveals: RevealScheduler,
    bus: RevealEventBus,
    /// The coordinator's own bus reader; applies reveal events to `messages`.
    store_feed: RevealSubscription,
    messages: ListStore<ChatMessage>,
    recipes: ListStore<Recipe>,
    deletes: DeleteQueue<Recipe>,
    next_message_id: u64,
}

impl Default for DeferredActionCoordinator {
    fn default() -> Self {
        Self::build(CoordinatorConfig::default())
    }
}

impl DeferredActionCoordinator {
    pub fn new(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CoordinatorConfig) -> Self {
        let mut bus = RevealEventBus::new();
        let store_feed = bus.subscribe();
        Self {
            timers: TimerRegistry::new(),
            reveals: RevealScheduler::new(config.reveal_cadence_ms, config.exclusive_reveal),
            deletes: DeleteQueue::new(config.grace_period_ms),
            bus,
            store_feed,
            messages: ListStore::new(),
            recipes: ListStore::new(),
            next_message_id: 0,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // --- Chat ---

    #[must_use]
    pub const fn messages(&self) -> &ListStore<ChatMessage> {
        &self.messages
    }

    pub fn push_user_message(&mut self, text: impl Into<String>) -> MessageId {
        self.push_message(Role::User, text.into(), MessageStatus::Complete)
    }

    /// Appends the assistant placeholder shown while the backend is working.
    pub fn begin_assistant_reply(&mut self) -> MessageId {
        self.push_message(Role::Assistant, String::new(), MessageStatus::Thinking)
    }

    fn push_message(&mut self, role: Role, text: String, status: MessageStatus) -> MessageId {
        self.next_message_id += 1;
        let id = MessageId(self.next_message_id);
        self.messages.upsert(ChatMessage {
            id,
            role,
            text,
            status,
        });
        id
    }

    /// Starts revealing `full_text` into message `target`. Sessions this one
    /// interrupts are settled with their full text. Returns `false` when the
    /// message does not exist.
    pub fn start_reveal(&mut self, target: MessageId, full_text: impl Into<String>) -> bool {
        if !self.messages.contains(&target) {
            warn!(%target, "reveal requested for unknown message");
            return false;
        }

        let started = self.reveals.start(target, full_text, &mut self.timers);
        for interrupted in started.interrupted {
            self.settle(interrupted);
        }

        self.messages.update(&target, |message| {
            message.text.clear();
            message.status = MessageStatus::Revealing;
        });
        if let Some(completed) = started.completed {
            self.bus.publish(&completed);
        }
        self.apply_reveal_feed();
        true
    }

    /// Stops the reveal for `target` and shows its full text at once.
    /// Idempotent.
    pub fn stop_reveal(&mut self, target: MessageId) -> Option<Interrupted> {
        let interrupted = self.reveals.stop(target, &mut self.timers)?;
        self.settle(interrupted.clone());
        Some(interrupted)
    }

    pub fn stop_all_reveals(&mut self) -> Vec<Interrupted> {
        let interrupted = self.reveals.stop_all(&mut self.timers);
        for entry in &interrupted {
            self.settle(entry.clone());
        }
        interrupted
    }

    fn settle(&mut self, interrupted: Interrupted) {
        let Interrupted { target, full_text } = interrupted;
        self.messages.update(&target, |message| {
            message.text = full_text;
            message.status = MessageStatus::Complete;
        });
    }

    /// Marks a placeholder as failed. Returns `false` when it no longer exists.
    pub fn fail_reply(&mut self, target: MessageId, text: impl Into<String>) -> bool {
        let text = text.into();
        self.messages.update(&target, |message| {
            message.text = text;
            message.status = MessageStatus::Failed;
        })
    }

    /// Resets every reveal session and empties the conversation.
    pub fn clear_conversation(&mut self) {
        self.reveals.reset_all(&mut self.timers);
        self.store_feed.drain();
        self.messages.clear();
        info!("conversation cleared");
    }

    pub fn subscribe_reveal(&mut self) -> RevealSubscription {
        self.bus.subscribe()
    }

    pub fn unsubscribe_reveal(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    #[must_use]
    pub fn reveal_session(&self, target: MessageId) -> Option<&RevealSession> {
        self.reveals.session(target)
    }

    #[must_use]
    pub fn is_revealing(&self) -> bool {
        self.reveals.is_revealing()
    }

    fn apply_reveal_feed(&mut self) {
        for event in self.store_feed.drain() {
            match event {
                RevealEvent::Progress {
                    target,
                    visible_text,
                } => {
                    self.messages.update(&target, |message| {
                        message.text = visible_text;
                        message.status = MessageStatus::Revealing;
                    });
                }
                RevealEvent::Completed { target, text } => {
                    self.messages.update(&target, |message| {
                        message.text = text;
                        message.status = MessageStatus::Complete;
                    });
                }
            }
        }
    }

    // --- Recipes ---

    #[must_use]
    pub const fn recipes(&self) -> &ListStore<Recipe> {
        &self.recipes
    }

    /// Reconciles with the authoritative list. Items owned by a pending
    /// batch stay hidden.
    pub fn replace_recipes(&mut self, recipes: Vec<Recipe>) {
        let hidden = self.deletes.pending_ids();
        self.recipes.reconcile(recipes, &hidden);
        debug!(visible = self.recipes.len(), hidden = hidden.len(), "recipes reconciled");
    }

    /// Applies an edit to a visible recipe. Recipes owned by a delete batch
    /// are not editable.
    pub fn update_recipe(
        &mut self,
        id: RecipeId,
        update: &RecipeUpdate,
    ) -> Result<(), CoordinatorError> {
        if self.deletes.pending_ids().contains(&id) {
            warn!(%id, "rejecting edit of a recipe pending deletion");
            return Err(CoordinatorError::AlreadyPending(vec![id.to_string()]));
        }
        if !self.recipes.update(&id, |recipe| recipe.apply(update)) {
            return Err(CoordinatorError::UnknownItems(vec![id.to_string()]));
        }
        info!(%id, "recipe edited");
        Ok(())
    }

    pub fn enqueue_delete<I>(&mut self, ids: I) -> Result<BatchId, CoordinatorError>
    where
        I: IntoIterator<Item = RecipeId>,
    {
        self.deletes
            .enqueue(ids, &mut self.recipes, &mut self.timers)
    }

    pub fn undo_delete(&mut self, batch_id: BatchId) -> Option<usize> {
        self.deletes
            .undo(batch_id, &mut self.recipes, &mut self.timers)
    }

    /// Ends a batch's grace period early.
    pub fn commit_delete(&mut self, batch_id: BatchId) -> Option<DeleteCommand<RecipeId>> {
        self.deletes.commit(batch_id, &mut self.timers)
    }

    pub fn complete_delete(
        &mut self,
        batch_id: BatchId,
        result: Result<(), ApiError>,
    ) -> Option<CommitOutcome> {
        self.deletes.resolve(
            batch_id,
            result,
            &mut self.recipes,
            self.config.restore_on_commit_failure,
        )
    }

    /// Batches not yet resolved, most recent first.
    pub fn pending_deletes(&self) -> impl Iterator<Item = &DeleteBatch<Recipe>> {
        self.deletes.batches()
    }

    #[must_use]
    pub fn pending_recipe_ids(&self) -> BTreeSet<RecipeId> {
        self.deletes.pending_ids()
    }

    // --- Timers ---

    /// Handles one timer firing. Returns the backend delete to issue when the
    /// firing ends a grace period. Stale handles are ignored.
    pub fn on_timer_fired(&mut self, id: TimerId) -> Option<DeleteCommand<RecipeId>> {
        let Self {
            timers,
            reveals,
            bus,
            ..
        } = self;

        let mut grace_over = None;
        timers.fire(id, |purpose| match purpose {
            TimerPurpose::RevealTick(target) => {
                let transition = reveals.tick(*target, id);
                for event in &transition.events {
                    bus.publish(event);
                }
                transition.next
            }
            TimerPurpose::GracePeriod(batch_id) => {
                grace_over = Some(*batch_id);
                Tick::Stop
            }
        })?;
        self.apply_reveal_feed();

        let batch_id = grace_over?;
        self.deletes.commit(batch_id, &mut self.timers)
    }

    /// Runs the virtual clock forward by `elapsed_ms`, firing every timer that
    /// falls due in order. Returns the backend deletes to issue.
    pub fn advance_clock(&mut self, elapsed_ms: u64) -> Vec<DeleteCommand<RecipeId>> {
        let until = self.timers.now_ms().saturating_add(elapsed_ms);
        let mut commands = Vec::new();
        while let Some(id) = self.timers.next_due(until) {
            commands.extend(self.on_timer_fired(id));
        }
        self.timers.advance_to(until);
        commands
    }

    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    pub fn drain_timer_commands(&mut self) -> Vec<TimerCommand> {
        self.timers.drain_commands()
    }

    #[must_use]
    pub fn live_timers(&self) -> usize {
        self.timers.live_count()
    }
}
