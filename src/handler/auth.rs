use crate::{
    AppState,
    dtos::{
        FilterUserDto, ForgotPasswordRequestDto, LoginUserDto, RefreshResponseDto,
        ResetPasswordRequestDto, Response, TokenStatusResponseDto, UserLoginResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::extract_token,
    service,
};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;
use validator::Validate;

/// Router for authentication endpoints. None of them sit behind the auth
/// middleware; the token endpoints read the token themselves.
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/token-check", get(token_check))
        .route("/token-renew", get(token_renew))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

fn access_cookie_header(token: &str) -> Result<HeaderValue, HttpError> {
    let cookie = Cookie::build(("access_token", token.to_owned()))
        .path("/")
        .http_only(true)
        .secure(true)
        .build();
    cookie.to_string().parse().map_err(|e| {
        tracing::error!("Cookie header error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })
}

fn token_or_401(cookie_jar: &CookieJar, headers: &HeaderMap) -> Result<String, HttpError> {
    extract_token(cookie_jar, headers)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))
}

/// Login with email or username; the token is returned in the body and as
/// an http-only cookie.
#[instrument(skip(app_state, body), fields(identifier = %body.identifier))]
pub async fn login(
    State(app_state): State<AppState>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let (access_token, user) = service::auth::login(
        &app_state.db_client,
        &body.identifier,
        &body.password,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .await
    .map_err(|e| {
        tracing::warn!("Login failed: {}", e);
        HttpError::from(e)
    })?;

    let mut headers = HeaderMap::new();
    headers.append(header::SET_COOKIE, access_cookie_header(&access_token)?);

    let response = Json(UserLoginResponseDto {
        status: "success".to_string(),
        access_token,
        user: FilterUserDto::filter_user(&user),
    });

    tracing::info!(user_id = %user.id, "Login successful");
    Ok((headers, response))
}

/// Clear the access token cookie.
#[instrument]
pub async fn logout() -> Result<impl IntoResponse, HttpError> {
    let cookie = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .secure(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        cookie.to_string().parse().map_err(|e| {
            tracing::error!("Cookie header error: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?,
    );

    Ok((
        headers,
        Json(Response {
            status: "success",
            message: "Logged out.".to_string(),
        }),
    ))
}

/// Classify the presented token: `ok` or `renewal_recommended`, 401 otherwise.
#[instrument(skip_all)]
pub async fn token_check(
    cookie_jar: CookieJar,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let token = token_or_401(&cookie_jar, &headers)?;
    let token_status =
        service::auth::token_status(&token, app_state.env.jwt_secret.as_bytes())?;

    Ok(Json(TokenStatusResponseDto {
        status: "success".to_string(),
        token_status,
    }))
}

/// Reissue a still-valid token of an existing user with a fresh expiry.
#[instrument(skip_all)]
pub async fn token_renew(
    cookie_jar: CookieJar,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let token = token_or_401(&cookie_jar, &headers)?;
    let access_token = service::auth::renew(
        &app_state.db_client,
        &token,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .await?;

    let mut response_headers = HeaderMap::new();
    response_headers.append(header::SET_COOKIE, access_cookie_header(&access_token)?);

    tracing::info!("Token renewed");
    Ok((
        response_headers,
        Json(RefreshResponseDto {
            status: "success".to_string(),
            access_token,
        }),
    ))
}

/// Request a password reset link. The answer is the same for unknown addresses.
#[instrument(skip(app_state, body))]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    Json(body): Json<ForgotPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid forgot_password input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    service::user::request_password_reset(
        &app_state.db_client,
        &app_state.mailer,
        &app_state.env.frontend_url,
        &body.email,
    )
    .await?;

    Ok(Json(Response {
        status: "success",
        message: "If the address is registered, a reset link has been sent.".to_string(),
    }))
}

#[instrument(skip(app_state, body))]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Json(body): Json<ResetPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid reset_password input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = service::user::set_password_with_token(
        &app_state.db_client,
        &body.token,
        &body.new_password,
    )
    .await?;

    tracing::info!(user_id = %user.id, "Password reset successful");
    Ok(Json(Response {
        status: "success",
        message: "Password has been reset.".to_string(),
    }))
}
