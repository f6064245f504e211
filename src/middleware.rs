use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::{ErrorMessage, HttpError},
    models::{User, UserRole},
    service,
};

/// Authenticated user, inserted into the request extensions by [`auth`].
///
/// ```ignore
/// async fn my_handler(Extension(auth): Extension<JWTAuthMiddleware>) {
///     // auth.user is the acting user
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Token from the `access_token` cookie, else from `Authorization: Bearer <token>`.
pub fn extract_token(cookie_jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// Rejects with 401 unless the token verifies and its user still exists.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, req.headers())
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let user = service::auth::authenticate(
        &app_state.db_client,
        &token,
        app_state.env.jwt_secret.as_bytes(),
    )
    .await
    .map_err(|e| {
        tracing::warn!("Rejected access token: {}", e);
        HttpError::from(e)
    })?;

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

/// Role gate for whole routers. Must run after [`auth`].
///
/// Returns 401 when the request was never authenticated and 403 when the
/// user's role is not in `required_roles`.
pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required_roles.contains(&user.user.role) {
        tracing::warn!(user_id = %user.user.id, role = user.user.role.to_str(), "Role not allowed");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(next.run(req).await)
}
