//! Caller identity extractors.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! customer as `X-User-Id` and, at the exit gate, the scanner's staff id as
//! `X-Staff-Id`.

use crate::handlers::ErrorResponse;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use std::convert::Infallible;
use uuid::Uuid;

pub const USER_HEADER: &str = "x-user-id";
pub const STAFF_HEADER: &str = "x-staff-id";

/// Staff id recorded when the scanner sends none
pub const DEFAULT_STAFF_ID: &str = "gate_scanner";

/// Authenticated customer
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(CurrentUser)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new(
                        "Missing or invalid X-User-Id",
                        "unauthenticated",
                        401,
                    )),
                )
            })
    }
}

/// Verifying staff member at the gate
#[derive(Debug, Clone)]
pub struct StaffId(pub String);

impl<S> FromRequestParts<S> for StaffId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let staff = parts
            .headers
            .get(STAFF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_STAFF_ID);
        Ok(StaffId(staff.to_string()))
    }
}
