//! Identity extraction.
//!
//! Credentials are verified upstream; requests arrive with opaque,
//! already-resolved identity headers. This module only reads them and decides
//! admin status against the configured admin email. It never parses tokens.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;

use crate::{errors::ServiceError, AppState};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// The caller's resolved identity.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub owner_id: String,
    pub owner_email: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }
}

fn required_header(parts: &Parts, name: &str) -> Result<String, ServiceError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let owner_id = required_header(parts, USER_ID_HEADER)?;
        let owner_email = required_header(parts, USER_EMAIL_HEADER)?;
        let is_admin = owner_email.eq_ignore_ascii_case(&app_state.config.admin_email);

        Ok(Identity {
            owner_id,
            owner_email,
            is_admin,
        })
    }
}

/// Identity that must belong to the storefront admin. Extraction fails with
/// 403 for everyone else.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            return Err(ServiceError::Forbidden("Admin only".to_string()));
        }
        Ok(AdminIdentity(identity))
    }
}
