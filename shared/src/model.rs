use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::config::{ApiConfig, CoordinatorConfig};
use crate::coordinator::DeferredActionCoordinator;
use crate::error::{AppError, ConfigError, ErrorSeverity};
use crate::list_store::Keyed;

// --- Typed IDs ---

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(RecipeId);
numeric_id!(MessageId);

/// Identity of one delete request. Unique per enqueue.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Recipes ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub ingredients: String,
    pub instructions: String,
    pub saved_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Keyed for Recipe {
    type Id = RecipeId;

    fn key(&self) -> RecipeId {
        self.id
    }
}

impl Recipe {
    pub fn apply(&mut self, update: &RecipeUpdate) {
        self.title.clone_from(&update.title);
        self.ingredients.clone_from(&update.ingredients);
        self.instructions.clone_from(&update.instructions);
        self.cost = update.cost;
    }
}

/// Editable fields of a saved recipe, in the shape the backend accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeUpdate {
    pub title: String,
    pub ingredients: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

// --- Chat ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Placeholder while the backend produces the reply.
    Thinking,
    Revealing,
    Complete,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
}

impl Keyed for ChatMessage {
    type Id = MessageId;

    fn key(&self) -> MessageId {
        self.id
    }
}

/// Photo attached to a prompt. Captured and encoded by the shell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data_base64: String,
}

// --- Toasts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub title: String,
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }
}

// --- Model ---

pub struct Model {
    pub coordinator: DeferredActionCoordinator,
    pub api: Option<ApiConfig>,
    pub selected: BTreeSet<RecipeId>,
    pub is_refreshing: bool,
    pub toast: Option<ToastMessage>,
    pub error: Option<AppError>,
}

impl Default for Model {
    fn default() -> Self {
        Self::from_coordinator(DeferredActionCoordinator::default())
    }
}

impl Model {
    pub fn with_config(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_coordinator(DeferredActionCoordinator::new(config)?))
    }

    fn from_coordinator(coordinator: DeferredActionCoordinator) -> Self {
        Self {
            coordinator,
            api: None,
            selected: BTreeSet::new(),
            is_refreshing: false,
            toast: None,
            error: None,
        }
    }

    pub fn show_toast(&mut self, toast: ToastMessage) {
        self.toast = Some(toast);
    }

    pub fn clear_toast(&mut self) {
        self.toast = None;
    }

    /// Transient failures become a toast; anything else sticks until dismissed.
    pub fn report(&mut self, title: &str, error: AppError) {
        if error.severity == ErrorSeverity::Transient {
            self.show_toast(ToastMessage::new(
                title,
                error.user_facing_message(),
                ToastKind::Error,
            ));
        } else {
            self.error = Some(error);
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Drops selections whose recipe is no longer visible.
    pub fn prune_selection(&mut self) {
        let recipes = self.coordinator.recipes();
        self.selected.retain(|id| recipes.contains(id));
    }
}

// --- View ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageView {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecipeView {
    pub id: RecipeId,
    pub title: String,
    pub ingredients: String,
    pub instructions: String,
    pub saved_at: String,
    pub cost_text: Option<String>,
    pub selected: bool,
}

/// Undo affordance for one pending delete batch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingDeletionView {
    pub batch_id: BatchId,
    pub label: String,
    pub count: usize,
    pub undoable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub title: String,
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            title: t.title.clone(),
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub configured: bool,
    pub messages: Vec<MessageView>,
    pub is_revealing: bool,
    pub recipes: Vec<RecipeView>,
    pub selected_count: usize,
    pub pending_deletions: Vec<PendingDeletionView>,
    pub is_refreshing: bool,
    pub toast: Option<ToastView>,
    pub error: Option<UserFacingError>,
}

#[must_use]
pub fn format_cost(cost: f64) -> String {
    format!("${cost:.2}")
}

#[must_use]
pub fn deletion_label(count: usize) -> String {
    if count == 1 {
        "1 recipe deleted".into()
    } else {
        format!("{count} recipes deleted")
    }
}

#[must_use]
pub fn restored_label(count: usize) -> String {
    if count == 1 {
        "1 recipe restored".into()
    } else {
        format!("{count} recipes restored")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_json_matches_backend_shape() {
        let json = r#"{
            "id": 7,
            "title": "Lentil soup",
            "ingredients": "lentils, onion",
            "instructions": "simmer",
            "saved_at": "2024-05-01T10:00:00Z"
        }"#;
        let recipe: Recipe = serde_json::from_str(json).expect("valid recipe");
        assert_eq!(recipe.id, RecipeId(7));
        assert_eq!(recipe.cost, None);
        assert_eq!(recipe.key(), RecipeId(7));
    }

    #[test]
    fn deletion_labels_pluralize() {
        assert_eq!(deletion_label(1), "1 recipe deleted");
        assert_eq!(deletion_label(3), "3 recipes deleted");
        assert_eq!(restored_label(1), "1 recipe restored");
        assert_eq!(restored_label(2), "2 recipes restored");
    }

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::generate(), BatchId::generate());
    }

    #[test]
    fn transient_errors_become_toasts() {
        let mut model = Model::default();
        model.report(
            "Delete failed",
            AppError::new(crate::error::ErrorKind::Network, "offline"),
        );
        assert!(model.error.is_none());
        assert_eq!(model.toast.as_ref().map(|t| t.kind), Some(ToastKind::Error));

        model.report(
            "Delete failed",
            AppError::new(crate::error::ErrorKind::Authentication, "expired"),
        );
        assert!(model.error.is_some());
    }

    #[test]
    fn update_replaces_editable_fields_only() {
        let mut recipe = Recipe {
            id: RecipeId(3),
            title: "Soup".into(),
            ingredients: "water".into(),
            instructions: "boil".into(),
            saved_at: "2024-05-01T10:00:00Z".into(),
            cost: Some(2.0),
        };
        recipe.apply(&RecipeUpdate {
            title: "Miso soup".into(),
            ingredients: "miso, water".into(),
            instructions: "whisk".into(),
            cost: None,
        });
        assert_eq!(recipe.id, RecipeId(3));
        assert_eq!(recipe.title, "Miso soup");
        assert_eq!(recipe.saved_at, "2024-05-01T10:00:00Z");
        assert_eq!(recipe.cost, None);
    }

    #[test]
    fn costs_render_with_two_decimals() {
        assert_eq!(format_cost(4.5), "$4.50");
    }
}
