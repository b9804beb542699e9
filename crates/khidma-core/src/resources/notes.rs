use serde_json::{Map, Value};
use tracing::info;

use super::{path_id, require_id};
use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{Note, NoteTarget, Page};

fn require_content(content: &str) -> Result<&str, ApiError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Invalid("note content must not be empty".to_string()));
    }
    Ok(trimmed)
}

pub async fn list(
    client: &ApiClient,
    target: NoteTarget,
    owner_id: &str,
) -> Result<Vec<Note>, ApiError> {
    let owner_id = path_id(target.segment(), owner_id)?;
    let page: Page<Note> = client
        .request_json(
            &format!("/notes/{}/{owner_id}", target.segment()),
            RequestOptions::get(),
        )
        .await?;
    Ok(page.into_items())
}

pub async fn create(
    client: &ApiClient,
    target: NoteTarget,
    owner_id: &str,
    content: &str,
) -> Result<Note, ApiError> {
    let owner_id = require_id(target.segment(), owner_id)?;
    let content = require_content(content)?;

    let mut payload = Map::new();
    payload.insert("content".to_string(), Value::from(content));
    payload.insert(target.owner_field().to_string(), Value::from(owner_id));

    let note: Note = client
        .request_json("/notes", RequestOptions::post().json(&payload)?)
        .await?;
    info!(id = %note.id, owner = owner_id, "note created");
    Ok(note)
}

pub async fn update(client: &ApiClient, note_id: &str, content: &str) -> Result<Note, ApiError> {
    let note_id = path_id("note", note_id)?;
    let content = require_content(content)?;
    client
        .request_json(
            &format!("/notes/{note_id}"),
            RequestOptions::patch().json(&serde_json::json!({ "content": content }))?,
        )
        .await
}

pub async fn delete(client: &ApiClient, note_id: &str) -> Result<(), ApiError> {
    let note_id = path_id("note", note_id)?;
    client
        .request(&format!("/notes/{note_id}"), RequestOptions::delete())
        .await?;
    info!(id = %note_id, "note deleted");
    Ok(())
}
