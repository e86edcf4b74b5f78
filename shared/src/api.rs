//! Backend endpoints and payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::model::{ImageAttachment, Recipe, RecipeId};

pub const CHAT_PATH: &str = "chat/";
pub const USER_RECIPES_PATH: &str = "get-user-recipes/";
pub const DELETE_MANY_PATH: &str = "delete-multiple-recipes/";

#[must_use]
pub fn delete_recipe_path(id: RecipeId) -> String {
    format!("delete-recipe/{id}/")
}

#[must_use]
pub fn update_recipe_path(id: RecipeId) -> String {
    format!("update-recipe/{id}/")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteManyRequest {
    pub recipe_ids: Vec<RecipeId>,
}

pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(payload).map_err(|e| ApiError::Body(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Body(e.to_string()))
}

/// Maps a status and body to the body of a successful response.
pub fn classify(status: u16, body: Option<Vec<u8>>) -> Result<Vec<u8>, ApiError> {
    if (200..300).contains(&status) {
        Ok(body.unwrap_or_default())
    } else {
        Err(ApiError::Status { status })
    }
}

/// Unwraps a crux_http result into the body of a 2xx response.
pub fn into_body(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> Result<Vec<u8>, ApiError> {
    let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;
    let status = u16::from(response.status());
    classify(status, response.take_body())
}

pub fn chat_reply(body: &[u8]) -> Result<String, ApiError> {
    decode::<ChatResponse>(body).map(|reply| reply.response)
}

pub fn recipes(body: &[u8]) -> Result<Vec<Recipe>, ApiError> {
    decode(body)
}
