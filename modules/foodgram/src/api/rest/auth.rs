//! Request authentication: `Authorization: Token <key>`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use modkit::{internal_error, unauthorized, ProblemResponse};

use crate::contract::model::CurrentUser;
use crate::domain::credentials::parse_token_header;
use crate::domain::service::Service;

/// The requester, if any. A present but unknown token is rejected with 401.
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.map(|u| u.id)
    }
}

/// An authenticated requester; 401 otherwise.
pub struct AuthUser(pub CurrentUser);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(None));
        };
        let key = value
            .to_str()
            .ok()
            .and_then(parse_token_header)
            .ok_or_else(|| unauthorized("Invalid token header."))?
            .to_string();
        let svc = parts
            .extensions
            .get::<Arc<Service>>()
            .cloned()
            .ok_or_else(|| internal_error("Service is not available"))?;
        let user = svc.authenticate(&key).await?;
        Ok(Self(Some(user)))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await?.0 {
            Some(user) => Ok(Self(user)),
            None => Err(unauthorized("Authentication credentials were not provided.")),
        }
    }
}
