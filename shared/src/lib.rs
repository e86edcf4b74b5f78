#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod coordinator;
pub mod delete_queue;
pub mod error;
pub mod event;
pub mod list_store;
pub mod model;
pub mod reveal;
pub mod timer;

pub use app::App;
pub use capabilities::{Capabilities, Effect, TimerOperation, TimerOutput};
pub use config::{ApiConfig, CoordinatorConfig};
pub use coordinator::DeferredActionCoordinator;
pub use crux_core::{render::Render, App as CruxApp};
pub use delete_queue::{CommitOutcome, DeleteCommand, DeleteTarget};
pub use error::{ApiError, AppError, ConfigError, CoordinatorError, ErrorKind, ErrorSeverity};
pub use event::Event;
pub use list_store::{Keyed, ListStore};
pub use model::{
    BatchId, ChatMessage, ImageAttachment, MessageId, MessageStatus, Model, Recipe, RecipeId,
    Role, ViewModel,
};
pub use reveal::{RevealEvent, RevealSubscription};
pub use timer::{TimerCommand, TimerId};
