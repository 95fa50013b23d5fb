//! POST /identify

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::identity::IdentityView;
use crate::AppState;

/// Phone numbers arrive either as text or as a bare JSON number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PhoneNumberInput {
    Text(String),
    Number(serde_json::Number),
}

impl PhoneNumberInput {
    pub fn into_string(self) -> String {
        match self {
            PhoneNumberInput::Text(text) => text,
            PhoneNumberInput::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, rename = "phoneNumber")]
    pub phone_number: Option<PhoneNumberInput>,
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub contact: IdentityView,
}

/// POST /identify
///
/// Resolves the observed (email, phone) pair and returns the consolidated
/// identity it belongs to.
pub async fn identify(
    State(state): State<AppState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> ApiResult<Json<IdentifyResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let contact = state
        .identity
        .identify(
            request.email,
            request.phone_number.map(PhoneNumberInput::into_string),
        )
        .await?;

    Ok(Json(IdentifyResponse { contact }))
}
