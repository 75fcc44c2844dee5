use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::InquiryStatus;
use crate::services::seasonal::{self, CodeVerification, NewInquiry};
use crate::state::AppState;

#[derive(Serialize)]
pub struct InquiryCreated {
    pub id: String,
    pub status: InquiryStatus,
}

// POST /api/inquiries
pub async fn create_inquiry(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewInquiry>,
) -> Result<(StatusCode, Json<InquiryCreated>), AppError> {
    let inquiry = seasonal::create_inquiry(&state, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(InquiryCreated {
            id: inquiry.id,
            status: inquiry.status,
        }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

// POST /api/seasonal-codes/verify
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<CodeVerification>, AppError> {
    Ok(Json(seasonal::verify_code(&state, &req.code)?))
}
