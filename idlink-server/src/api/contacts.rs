//! Contact listing and deletion
//!
//! GET /contacts, DELETE /contacts/:id, DELETE /contacts?confirm=true

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use idlink_common::db::{Contact, ContactId, LinkPrecedence};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Raw contact record as listed by GET /contacts
#[derive(Debug, Serialize)]
pub struct ContactRecord {
    pub id: ContactId,
    #[serde(rename = "phonenumber")]
    pub phone_number: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "linkedid")]
    pub linked_id: Option<ContactId>,
    #[serde(rename = "linkprecedence")]
    pub link_precedence: LinkPrecedence,
    #[serde(rename = "createdat")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedat")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "deletedat")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Contact> for ContactRecord {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            phone_number: contact.phone_number,
            email: contact.email,
            linked_id: contact.linked_id,
            link_precedence: contact.link_precedence,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
            deleted_at: contact.deleted_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContactResponse {
    pub success: bool,
    pub message: String,
    pub deleted_contact_id: ContactId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub success: bool,
    pub message: String,
    pub deleted_count: u64,
}

/// Query parameters for bulk deletion
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub confirm: Option<String>,
}

/// GET /contacts
///
/// All active records ordered by id.
pub async fn list_contacts(State(state): State<AppState>) -> ApiResult<Json<Vec<ContactRecord>>> {
    let contacts = state.identity.active_contacts().await?;
    Ok(Json(contacts.into_iter().map(ContactRecord::from).collect()))
}

/// DELETE /contacts/:id
pub async fn delete_contact(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<DeleteContactResponse>> {
    let id: ContactId = raw_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid contact id: {}", raw_id)))?;

    let outcome = state.identity.delete_contact(id).await?;

    Ok(Json(DeleteContactResponse {
        success: true,
        message: outcome.message(),
        deleted_contact_id: outcome.contact_id,
    }))
}

/// DELETE /contacts?confirm=true
///
/// Only the literal value `true` confirms the bulk delete.
pub async fn delete_all_contacts(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> ApiResult<Json<DeleteAllResponse>> {
    let confirmed = query.confirm.as_deref() == Some("true");
    let deleted_count = state.identity.delete_all(confirmed).await?;

    Ok(Json(DeleteAllResponse {
        success: true,
        message: format!("Deleted {} contact(s)", deleted_count),
        deleted_count,
    }))
}
