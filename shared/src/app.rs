use tracing::{debug, info, trace, warn};

use crate::api::{self, ChatRequest, DeleteManyRequest};
use crate::capabilities::{Capabilities, TimerOutput};
use crate::config::ApiConfig;
use crate::delete_queue::{CommitOutcome, DeleteCommand, DeleteTarget};
use crate::error::{ApiError, AppError, ErrorSeverity};
use crate::event::Event;
use crate::model::{
    deletion_label, format_cost, restored_label, BatchId, ImageAttachment, MessageView, Model,
    PendingDeletionView, RecipeId, RecipeUpdate, RecipeView, ToastKind, ToastMessage, ToastView,
    UserFacingError, ViewModel,
};
use crate::timer::TimerCommand;

#[derive(Default)]
pub struct App;

impl App {
    /// Forwards queued schedule/cancel requests to the shell's timers.
    fn flush_timers(model: &mut Model, caps: &Capabilities) {
        for command in model.coordinator.drain_timer_commands() {
            match command {
                TimerCommand::Schedule { id, delay_ms } => {
                    caps.timer.notify_after(id, delay_ms, Event::TimerElapsed);
                }
                TimerCommand::Cancel { id } => caps.timer.cancel(id),
            }
        }
    }

    fn session(model: &mut Model, title: &str) -> Option<ApiConfig> {
        if model.api.is_none() {
            model.report(title, ApiError::NotConfigured.into());
        }
        model.api.clone()
    }

    fn refresh_recipes(model: &mut Model, caps: &Capabilities) {
        let Some(api) = Self::session(model, "Couldn't load recipes") else {
            return;
        };
        model.is_refreshing = true;

        caps.http
            .get(api.endpoint(api::USER_RECIPES_PATH))
            .header("Authorization", api.authorization_header())
            .send(|result| {
                Event::RecipesLoaded(api::into_body(result).and_then(|body| api::recipes(&body)))
            });
    }

    fn submit_prompt(
        prompt: &str,
        image: Option<ImageAttachment>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let prompt = prompt.trim();
        if prompt.is_empty() && image.is_none() {
            debug!("ignoring empty prompt");
            return;
        }
        let Some(api) = Self::session(model, "Chat unavailable") else {
            return;
        };

        model.coordinator.stop_all_reveals();
        model.coordinator.push_user_message(prompt);
        let message_id = model.coordinator.begin_assistant_reply();

        let request = ChatRequest {
            prompt: prompt.to_string(),
            image,
        };
        let body = match api::encode(&request) {
            Ok(body) => body,
            Err(e) => {
                let error = AppError::from(e);
                model
                    .coordinator
                    .fail_reply(message_id, error.user_facing_message());
                model.report("Chat failed", error);
                return;
            }
        };

        info!(%message_id, has_image = request.image.is_some(), "prompt submitted");
        caps.http
            .post(api.endpoint(api::CHAT_PATH))
            .header("Authorization", api.authorization_header())
            .header("Content-Type", "application/json")
            .body(body)
            .send(move |result| Event::ChatReplyReceived {
                message_id,
                result: api::into_body(result).and_then(|body| api::chat_reply(&body)),
            });
    }

    /// Edits locally, then sends the edit. The next refresh reconciles
    /// either outcome.
    fn update_recipe(id: RecipeId, update: &RecipeUpdate, model: &mut Model, caps: &Capabilities) {
        let Some(api) = Self::session(model, "Update failed") else {
            return;
        };
        if let Err(e) = model.coordinator.update_recipe(id, update) {
            warn!(%id, error = %e, "edit rejected");
            model.report("Update failed", e.into());
            return;
        }
        let body = match api::encode(update) {
            Ok(body) => body,
            Err(e) => {
                model.report("Update failed", e.into());
                Self::refresh_recipes(model, caps);
                return;
            }
        };

        caps.http
            .put(api.endpoint(&api::update_recipe_path(id)))
            .header("Authorization", api.authorization_header())
            .header("Content-Type", "application/json")
            .body(body)
            .send(move |result| Event::RecipeUpdateCompleted {
                id,
                result: api::into_body(result).map(|_| ()),
            });
    }

    fn enqueue_delete<I>(ids: I, model: &mut Model)
    where
        I: IntoIterator<Item = RecipeId>,
    {
        match model.coordinator.enqueue_delete(ids) {
            Ok(batch_id) => {
                model.prune_selection();
                debug!(batch = %batch_id, "undo available");
            }
            Err(e) => {
                warn!(error = %e, "delete rejected");
                model.report("Delete failed", e.into());
            }
        }
    }

    fn send_delete(command: DeleteCommand<RecipeId>, model: &mut Model, caps: &Capabilities) {
        let DeleteCommand { batch_id, target } = command;
        let Some(api) = model.api.clone() else {
            Self::finish_delete(batch_id, Err(ApiError::NotConfigured), model, caps);
            return;
        };

        let builder = match target {
            DeleteTarget::Single(id) => caps.http.delete(api.endpoint(&api::delete_recipe_path(id))),
            DeleteTarget::Many(recipe_ids) => {
                match api::encode(&DeleteManyRequest { recipe_ids }) {
                    Ok(body) => caps
                        .http
                        .post(api.endpoint(api::DELETE_MANY_PATH))
                        .header("Content-Type", "application/json")
                        .body(body),
                    Err(e) => {
                        Self::finish_delete(batch_id, Err(e), model, caps);
                        return;
                    }
                }
            }
        };

        builder
            .header("Authorization", api.authorization_header())
            .send(move |result| Event::DeleteCommitted {
                batch_id,
                result: api::into_body(result).map(|_| ()),
            });
    }

    fn finish_delete(
        batch_id: BatchId,
        result: Result<(), ApiError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        match model.coordinator.complete_delete(batch_id, result) {
            Some(CommitOutcome::Confirmed { count, .. }) => {
                model.show_toast(ToastMessage::new(
                    "Deleted!",
                    deletion_label(count),
                    ToastKind::Success,
                ));
                Self::refresh_recipes(model, caps);
            }
            Some(CommitOutcome::Failed {
                count,
                restored,
                error,
                ..
            }) => {
                let error = AppError::from(error)
                    .with_severity(ErrorSeverity::Transient)
                    .with_context("batch_size", count.to_string())
                    .with_context("restored", restored.to_string());
                model.report("Delete failed", error);
            }
            None => debug!(batch = %batch_id, "delete outcome for a retired batch"),
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if event.is_user_initiated() {
            debug!(event = event.name(), "user action");
        } else {
            trace!(event = event.name(), "event");
        }

        match event {
            Event::SessionConfigured {
                api_base_url,
                auth_token,
            } => match ApiConfig::new(&api_base_url, auth_token) {
                Ok(api) => {
                    info!(base_url = api.base_url(), "backend session configured");
                    model.api = Some(api);
                    model.clear_error();
                    Self::refresh_recipes(model, caps);
                }
                Err(e) => {
                    warn!(error = %e, "rejected backend session");
                    model.report("Configuration failed", e.into());
                }
            },

            Event::PromptSubmitted { prompt, image } => {
                Self::submit_prompt(&prompt, image, model, caps);
            }

            Event::ChatReplyReceived { message_id, result } => match result {
                Ok(text) => {
                    if !model.coordinator.start_reveal(message_id, text) {
                        debug!(%message_id, "reply for a cleared conversation dropped");
                    }
                }
                Err(e) => {
                    warn!(%message_id, error = %e, "chat request failed");
                    let error = AppError::from(e).with_severity(ErrorSeverity::Transient);
                    if model
                        .coordinator
                        .fail_reply(message_id, error.user_facing_message())
                    {
                        model.report("Chat failed", error);
                    }
                }
            },

            Event::StopRevealRequested => {
                model.coordinator.stop_all_reveals();
            }

            Event::ClearChatRequested => model.coordinator.clear_conversation(),

            Event::RefreshRecipesRequested => Self::refresh_recipes(model, caps),

            Event::RecipesLoaded(result) => {
                model.is_refreshing = false;
                match result {
                    Ok(recipes) => {
                        model.coordinator.replace_recipes(recipes);
                        model.prune_selection();
                    }
                    Err(e) => {
                        warn!(error = %e, "recipe refresh failed");
                        model.report("Couldn't load recipes", e.into());
                    }
                }
            }

            Event::RecipeSelectionToggled { id } => {
                if !model.coordinator.recipes().contains(&id) {
                    debug!(%id, "selection toggle for a hidden recipe");
                } else if !model.selected.remove(&id) {
                    model.selected.insert(id);
                }
            }

            Event::SelectionCleared => model.selected.clear(),

            Event::RecipeUpdateRequested { id, update } => {
                Self::update_recipe(id, &update, model, caps);
            }

            Event::RecipeUpdateCompleted { id, result } => {
                match result {
                    Ok(()) => {
                        info!(%id, "recipe update confirmed");
                        model.show_toast(ToastMessage::new(
                            "Updated!",
                            "Recipe updated successfully.",
                            ToastKind::Success,
                        ));
                    }
                    Err(e) => {
                        warn!(%id, error = %e, "recipe update failed");
                        model.report(
                            "Update failed",
                            AppError::from(e).with_severity(ErrorSeverity::Transient),
                        );
                    }
                }
                Self::refresh_recipes(model, caps);
            }

            Event::DeleteRecipeRequested { id } => Self::enqueue_delete([id], model),

            Event::DeleteSelectedRequested => {
                let selected = model.selected.clone();
                if selected.is_empty() {
                    debug!("nothing selected to delete");
                } else {
                    Self::enqueue_delete(selected, model);
                }
            }

            Event::UndoDeleteRequested { batch_id } => {
                match model.coordinator.undo_delete(batch_id) {
                    Some(restored) => {
                        info!(batch = %batch_id, restored, "delete undone");
                        model.show_toast(ToastMessage::new(
                            "Undone",
                            restored_label(restored),
                            ToastKind::Info,
                        ));
                    }
                    None => debug!(batch = %batch_id, "undo arrived after commit"),
                }
            }

            Event::DeleteCommitted { batch_id, result } => {
                Self::finish_delete(batch_id, result, model, caps);
            }

            Event::TimerElapsed(TimerOutput::Fired { id }) => {
                if let Some(command) = model.coordinator.on_timer_fired(id) {
                    Self::send_delete(command, model, caps);
                }
            }

            Event::TimerElapsed(TimerOutput::Cancelled { id }) => {
                trace!(%id, "shell timer cancelled");
            }

            Event::DismissToast => model.clear_toast(),

            Event::DismissError => model.clear_error(),
        }

        Self::flush_timers(model, caps);
        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let coordinator = &model.coordinator;

        let messages = coordinator
            .messages()
            .iter()
            .map(|m| MessageView {
                id: m.id,
                role: m.role,
                text: m.text.clone(),
                status: m.status,
            })
            .collect();

        let recipes = coordinator
            .recipes()
            .iter()
            .map(|r| RecipeView {
                id: r.id,
                title: r.title.clone(),
                ingredients: r.ingredients.clone(),
                instructions: r.instructions.clone(),
                saved_at: r.saved_at.clone(),
                cost_text: r.cost.map(format_cost),
                selected: model.selected.contains(&r.id),
            })
            .collect();

        let pending_deletions = coordinator
            .pending_deletes()
            .map(|batch| PendingDeletionView {
                batch_id: batch.id(),
                label: deletion_label(batch.len()),
                count: batch.len(),
                undoable: batch.is_undoable(),
            })
            .collect();

        ViewModel {
            configured: model.api.is_some(),
            messages,
            is_revealing: coordinator.is_revealing(),
            recipes,
            selected_count: model.selected.len(),
            pending_deletions,
            is_refreshing: model.is_refreshing,
            toast: model.toast.as_ref().map(ToastView::from),
            error: model.error.as_ref().map(UserFacingError::from),
        }
    }
}
