//! Caller identity extractors.
//!
//! The storefront never authenticates anyone itself. The authentication
//! collaborator either stores an [`Identity`] in the session via
//! [`set_current_identity`], or (behind a trusted gateway) sends it in the
//! `x-auth-*` headers read by [`gateway_identity_middleware`].

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use opticart_core::{Email, Identity, UserId};
use tower_sessions::Session;
use tracing::debug;

use crate::error::{AppError, set_sentry_user};
use crate::models::session_keys;

/// Gateway header carrying the user ID.
pub const USER_ID_HEADER: &str = "x-auth-user-id";
/// Gateway header carrying the user's email.
pub const EMAIL_HEADER: &str = "x-auth-email";
/// Gateway header set to `true` for administrators.
pub const ADMIN_HEADER: &str = "x-auth-admin";

/// Identity established by the gateway for this request.
#[derive(Debug, Clone)]
struct GatewayIdentity(Identity);

/// Parse the gateway headers. Returns `None` without a user ID.
fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let user_id = UserId::new(header(USER_ID_HEADER)?);
    let email = header(EMAIL_HEADER).and_then(|raw| match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed gateway email");
            None
        }
    });
    let is_admin = header(ADMIN_HEADER).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

    Some(Identity {
        user_id,
        email,
        is_admin,
    })
}

/// Middleware that trusts identity headers from an upstream gateway.
///
/// Only install this when the storefront is reachable solely through a
/// gateway that strips these headers from client requests.
pub async fn gateway_identity_middleware(mut request: Request, next: Next) -> Response {
    if let Some(identity) = identity_from_headers(request.headers()) {
        request.extensions_mut().insert(GatewayIdentity(identity));
    }
    next.run(request).await
}

/// Extractor that optionally gets the caller's identity.
///
/// Gateway headers take precedence over the session. Anonymous callers get
/// `None`.
pub struct OptionalIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<GatewayIdentity>() {
            Some(GatewayIdentity(identity)) => Some(identity.clone()),
            None => match parts.extensions.get::<Session>() {
                Some(session) => session
                    .get::<Identity>(session_keys::IDENTITY)
                    .await
                    .ok()
                    .flatten(),
                None => None,
            },
        };

        if let Some(identity) = &identity {
            tracing::Span::current().record("user_id", identity.user_id.as_str());
            set_sentry_user(&identity.user_id, identity.email.as_ref().map(Email::as_str));
        }

        Ok(Self(identity))
    }
}

/// Extractor that requires an administrator.
///
/// Rejects anonymous callers with 401 and everyone else with 403.
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(OptionalIdentity(identity)) =
            OptionalIdentity::from_request_parts(parts, state).await;

        match identity {
            Some(identity) if identity.is_admin => Ok(Self(identity)),
            Some(_) => Err(AppError::Forbidden(
                "administrator access required".to_string(),
            )),
            None => Err(AppError::Unauthorized("sign in required".to_string())),
        }
    }
}

/// Helper to set the current identity in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_identity(
    session: &Session,
    identity: &Identity,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::IDENTITY, identity).await
}

/// Helper to clear the current identity from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_identity(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.remove::<Identity>(session_keys::IDENTITY).await?;
    Ok(())
}
