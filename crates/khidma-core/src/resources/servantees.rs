use tracing::info;

use super::{ListQuery, fetch_all as fetch_collection, list_page, path_id};
use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{Page, Servantee, ServanteeInput};

const COLLECTION: &str = "servantees";

pub async fn list(client: &ApiClient, query: &ListQuery) -> Result<Page<Servantee>, ApiError> {
    list_page(client, COLLECTION, query).await
}

pub async fn fetch_all(client: &ApiClient) -> Result<Vec<Servantee>, ApiError> {
    fetch_collection(client, COLLECTION).await
}

pub async fn get(client: &ApiClient, id: &str) -> Result<Servantee, ApiError> {
    let id = path_id("servantee", id)?;
    client
        .request_json(&format!("/{COLLECTION}/{id}"), RequestOptions::get())
        .await
}

pub async fn create(client: &ApiClient, input: &ServanteeInput) -> Result<Servantee, ApiError> {
    if input.name.as_deref().is_none_or(|name| name.trim().is_empty()) {
        return Err(ApiError::Invalid("servantee name is required".to_string()));
    }
    let created: Servantee = client
        .request_json(&format!("/{COLLECTION}"), RequestOptions::post().json(input)?)
        .await?;
    info!(id = %created.id, "servantee created");
    Ok(created)
}

pub async fn update(
    client: &ApiClient,
    id: &str,
    changes: &ServanteeInput,
) -> Result<Servantee, ApiError> {
    let id = path_id("servantee", id)?;
    if changes == &ServanteeInput::default() {
        return Err(ApiError::Invalid("no servantee fields to update".to_string()));
    }
    client
        .request_json(
            &format!("/{COLLECTION}/{id}"),
            RequestOptions::patch().json(changes)?,
        )
        .await
}

pub async fn delete(client: &ApiClient, id: &str) -> Result<(), ApiError> {
    let id = path_id("servantee", id)?;
    client
        .request(&format!("/{COLLECTION}/{id}"), RequestOptions::delete())
        .await?;
    info!(id = %id, "servantee deleted");
    Ok(())
}
