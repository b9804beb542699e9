use serde::Serialize;
use tracing::info;

use super::{ListQuery, fetch_all as fetch_collection, list_page, path_id, require_id};
use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{Page, Retreat, RetreatInput};

const COLLECTION: &str = "retreats";

#[derive(Serialize)]
struct AttendeesUpdate<'a> {
    attendees: Vec<&'a str>,
}

pub async fn list(client: &ApiClient, query: &ListQuery) -> Result<Page<Retreat>, ApiError> {
    list_page(client, COLLECTION, query).await
}

pub async fn fetch_all(client: &ApiClient) -> Result<Vec<Retreat>, ApiError> {
    fetch_collection(client, COLLECTION).await
}

/// Retreats the servantee attended, in the order the backend returns them.
pub async fn for_servantee(
    client: &ApiClient,
    servantee_id: &str,
) -> Result<Vec<Retreat>, ApiError> {
    let servantee_id = path_id("servantee", servantee_id)?;
    let page: Page<Retreat> = client
        .request_json(
            &format!("/{COLLECTION}/servantee/{servantee_id}"),
            RequestOptions::get(),
        )
        .await?;
    Ok(page.into_items())
}

pub async fn get(client: &ApiClient, id: &str) -> Result<Retreat, ApiError> {
    let id = path_id("retreat", id)?;
    client
        .request_json(&format!("/{COLLECTION}/{id}"), RequestOptions::get())
        .await
}

pub async fn create(client: &ApiClient, input: &RetreatInput) -> Result<Retreat, ApiError> {
    if input.name.as_deref().is_none_or(|name| name.trim().is_empty()) {
        return Err(ApiError::Invalid("retreat name is required".to_string()));
    }
    check_dates(input)?;
    let created: Retreat = client
        .request_json(&format!("/{COLLECTION}"), RequestOptions::post().json(input)?)
        .await?;
    info!(id = %created.id, "retreat created");
    Ok(created)
}

pub async fn update(
    client: &ApiClient,
    id: &str,
    changes: &RetreatInput,
) -> Result<Retreat, ApiError> {
    let id = path_id("retreat", id)?;
    if changes.is_empty() {
        return Err(ApiError::Invalid("nothing to update".to_string()));
    }
    if changes.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(ApiError::Invalid("retreat name must not be blank".to_string()));
    }
    check_dates(changes)?;
    let updated: Retreat = client
        .request_json(
            &format!("/{COLLECTION}/{id}"),
            RequestOptions::patch().json(changes)?,
        )
        .await?;
    info!(id = %updated.id, "retreat updated");
    Ok(updated)
}

pub async fn delete(client: &ApiClient, id: &str) -> Result<(), ApiError> {
    let id = path_id("retreat", id)?;
    client
        .request(&format!("/{COLLECTION}/{id}"), RequestOptions::delete())
        .await?;
    info!(id = %id, "retreat deleted");
    Ok(())
}

/// Register a servantee for a retreat. Already registered servantees are left as is.
pub async fn add_attendee(
    client: &ApiClient,
    retreat_id: &str,
    servantee_id: &str,
) -> Result<Retreat, ApiError> {
    let servantee_id = require_id("servantee", servantee_id)?;
    let retreat = get(client, retreat_id).await?;
    let mut attendees: Vec<&str> = retreat.attendee_ids().collect();
    if attendees.contains(&servantee_id) {
        return Ok(retreat);
    }
    attendees.push(servantee_id);
    let updated = set_attendees(client, &retreat.id, attendees).await?;
    info!(retreat = %retreat.id, servantee = servantee_id, "attendee added");
    Ok(updated)
}

pub async fn remove_attendee(
    client: &ApiClient,
    retreat_id: &str,
    servantee_id: &str,
) -> Result<Retreat, ApiError> {
    let servantee_id = require_id("servantee", servantee_id)?;
    let retreat = get(client, retreat_id).await?;
    let attendees: Vec<&str> = retreat
        .attendee_ids()
        .filter(|id| *id != servantee_id)
        .collect();
    let updated = set_attendees(client, &retreat.id, attendees).await?;
    info!(retreat = %retreat.id, servantee = servantee_id, "attendee removed");
    Ok(updated)
}

fn check_dates(input: &RetreatInput) -> Result<(), ApiError> {
    match (input.start_date, input.end_date) {
        (Some(start), Some(end)) if end < start => Err(ApiError::Invalid(
            "retreat cannot end before it starts".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn set_attendees(
    client: &ApiClient,
    retreat_id: &str,
    attendees: Vec<&str>,
) -> Result<Retreat, ApiError> {
    let retreat_id = path_id("retreat", retreat_id)?;
    client
        .request_json(
            &format!("/{COLLECTION}/{retreat_id}"),
            RequestOptions::patch().json(&AttendeesUpdate { attendees })?,
        )
        .await
}
