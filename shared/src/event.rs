use serde::{Deserialize, Serialize};

use crate::capabilities::TimerOutput;
use crate::error::ApiError;
use crate::model::{BatchId, ImageAttachment, MessageId, Recipe, RecipeId, RecipeUpdate};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Session
    SessionConfigured {
        api_base_url: String,
        auth_token: String,
    },

    // Chat
    PromptSubmitted {
        prompt: String,
        image: Option<ImageAttachment>,
    },
    #[serde(skip)]
    ChatReplyReceived {
        message_id: MessageId,
        result: Result<String, ApiError>,
    },
    StopRevealRequested,
    ClearChatRequested,

    // Recipes
    RefreshRecipesRequested,
    #[serde(skip)]
    RecipesLoaded(Result<Vec<Recipe>, ApiError>),
    RecipeSelectionToggled {
        id: RecipeId,
    },
    SelectionCleared,
    RecipeUpdateRequested {
        id: RecipeId,
        update: RecipeUpdate,
    },
    #[serde(skip)]
    RecipeUpdateCompleted {
        id: RecipeId,
        result: Result<(), ApiError>,
    },
    DeleteRecipeRequested {
        id: RecipeId,
    },
    DeleteSelectedRequested,
    UndoDeleteRequested {
        batch_id: BatchId,
    },
    #[serde(skip)]
    DeleteCommitted {
        batch_id: BatchId,
        result: Result<(), ApiError>,
    },

    // Timers
    #[serde(skip)]
    TimerElapsed(TimerOutput),

    // UI
    DismissToast,
    DismissError,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionConfigured { .. } => "session_configured",
            Self::PromptSubmitted { .. } => "prompt_submitted",
            Self::ChatReplyReceived { .. } => "chat_reply_received",
            Self::StopRevealRequested => "stop_reveal_requested",
            Self::ClearChatRequested => "clear_chat_requested",
            Self::RefreshRecipesRequested => "refresh_recipes_requested",
            Self::RecipesLoaded(_) => "recipes_loaded",
            Self::RecipeSelectionToggled { .. } => "recipe_selection_toggled",
            Self::SelectionCleared => "selection_cleared",
            Self::RecipeUpdateRequested { .. } => "recipe_update_requested",
            Self::RecipeUpdateCompleted { .. } => "recipe_update_completed",
            Self::DeleteRecipeRequested { .. } => "delete_recipe_requested",
            Self::DeleteSelectedRequested => "delete_selected_requested",
            Self::UndoDeleteRequested { .. } => "undo_delete_requested",
            Self::DeleteCommitted { .. } => "delete_committed",
            Self::TimerElapsed(_) => "timer_elapsed",
            Self::DismissToast => "dismiss_toast",
            Self::DismissError => "dismiss_error",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::PromptSubmitted { .. }
                | Self::StopRevealRequested
                | Self::ClearChatRequested
                | Self::RefreshRecipesRequested
                | Self::RecipeSelectionToggled { .. }
                | Self::SelectionCleared
                | Self::RecipeUpdateRequested { .. }
                | Self::DeleteRecipeRequested { .. }
                | Self::DeleteSelectedRequested
                | Self::UndoDeleteRequested { .. }
                | Self::DismissToast
                | Self::DismissError
        )
    }
}
