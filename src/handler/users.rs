use crate::{
    AppState,
    dtos::{CreateUserDto, FilterUserDto, UpdateUserDto, UserListResponseDto, UserResponseDto},
    error::HttpError,
    middleware::{JWTAuthMiddleware, role_check},
    models::UserRole,
    service,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;
use validator::Validate;

/// Router for user management endpoints
///
/// All routes sit behind the auth middleware (applied in routes.rs). Listing
/// and creating users is for managers; the per-id routes let plain users
/// reach their own record and the service decides the rest.
pub fn users_handler() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route(
            "/",
            get(get_users)
                .post(create_user)
                .layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin, UserRole::Coach])
                })),
        )
        .route(
            "/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(user), fields(user_id = %user.user.id))]
pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        user: FilterUserDto::filter_user(&user.user),
        mail_warning: None,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_users(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let users = service::user::list(&app_state.db_client, &user.user).await?;

    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        results: users.len(),
        users: FilterUserDto::filter_users(&users),
    }))
}

/// Create a user and mail them a welcome message. A mail failure is reported
/// as `mail_warning`, the user is created either way.
#[instrument(skip(user, app_state, body), fields(actor = %user.user.id, username = %body.username))]
pub async fn create_user(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_user input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let created = service::user::create(
        &app_state.db_client,
        &app_state.mailer,
        &app_state.env.frontend_url,
        &body.into(),
        &user.user,
    )
    .await?;

    tracing::info!(user_id = %created.user.id, "User created");
    Ok((
        StatusCode::CREATED,
        Json(UserResponseDto {
            status: "success".to_string(),
            user: FilterUserDto::filter_user(&created.user),
            mail_warning: created.mail_warning,
        }),
    ))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_user(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let found = service::user::get(&app_state.db_client, &user_id, &user.user).await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        user: FilterUserDto::filter_user(&found),
        mail_warning: None,
    }))
}

#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn update_user(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_user input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let updated =
        service::user::update(&app_state.db_client, &user_id, &body.into(), &user.user).await?;

    tracing::info!(user_id = %updated.id, "User updated");
    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        user: FilterUserDto::filter_user(&updated),
        mail_warning: None,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn delete_user(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let deleted = service::user::delete(&app_state.db_client, &user_id, &user.user).await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        user: FilterUserDto::filter_user(&deleted),
        mail_warning: None,
    }))
}
