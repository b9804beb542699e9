use tracing::info;

use super::{ListQuery, list_page, path_id};
use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{Page, Servant, ServantInput, ServantUpdate};

const COLLECTION: &str = "users";

pub async fn list(client: &ApiClient, query: &ListQuery) -> Result<Page<Servant>, ApiError> {
    list_page(client, COLLECTION, query).await
}

/// Every servant account, as returned by the unpaged `/users` endpoint.
pub async fn all(client: &ApiClient) -> Result<Vec<Servant>, ApiError> {
    let page: Page<Servant> = client
        .request_json(&format!("/{COLLECTION}"), RequestOptions::get())
        .await?;
    Ok(page.into_items())
}

pub async fn create(client: &ApiClient, input: &ServantInput) -> Result<Servant, ApiError> {
    if input.name.trim().is_empty() || input.email.trim().is_empty() {
        return Err(ApiError::Invalid(
            "servant name and email are required".to_string(),
        ));
    }
    if input.password.is_empty() {
        return Err(ApiError::Invalid("servant password is required".to_string()));
    }
    let created: Servant = client
        .request_json(&format!("/{COLLECTION}"), RequestOptions::post().json(input)?)
        .await?;
    info!(id = %created.id, role = created.role.label(), "servant created");
    Ok(created)
}

/// Change a servant's account. Only the fields set on `changes` are sent.
pub async fn update(
    client: &ApiClient,
    id: &str,
    changes: &ServantUpdate,
) -> Result<Servant, ApiError> {
    let id = path_id("servant", id)?;
    if changes.is_empty() {
        return Err(ApiError::Invalid("nothing to update".to_string()));
    }
    if [&changes.name, &changes.email]
        .into_iter()
        .flatten()
        .any(|value| value.trim().is_empty())
    {
        return Err(ApiError::Invalid(
            "servant name and email must not be blank".to_string(),
        ));
    }
    let updated: Servant = client
        .request_json(
            &format!("/{COLLECTION}/{id}"),
            RequestOptions::patch().json(changes)?,
        )
        .await?;
    info!(id = %updated.id, role = updated.role.label(), "servant updated");
    Ok(updated)
}

pub async fn delete(client: &ApiClient, id: &str) -> Result<(), ApiError> {
    let id = path_id("servant", id)?;
    client
        .request(&format!("/{COLLECTION}/{id}"), RequestOptions::delete())
        .await?;
    info!(id = %id, "servant deleted");
    Ok(())
}
