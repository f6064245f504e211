use crate::{
    AppState,
    dtos::{
        CategoryListResponseDto, CategoryRenameDto, CategoryReorderDto, CategoryResponseDto,
        QuestionContentDto, QuestionListResponseDto, QuestionResponseDto, Response,
    },
    error::HttpError,
    middleware::{JWTAuthMiddleware, role_check},
    models::UserRole,
    service,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tracing::instrument;
use validator::Validate;

/// Catalog editing, managers only.
pub fn questions_handler() -> Router<AppState> {
    Router::new()
        .route("/categories", get(get_categories))
        .route("/categories/{category_id}", get(get_category_questions))
        .route("/categories/{category_id}/name", put(rename_category))
        .route("/categories/{category_id}/order", put(reorder_category))
        .route("/", get(get_questions))
        .route("/{question_id}", put(update_question))
        .route("/defaults", post(reload_defaults))
        .layer(middleware::from_fn(|req, next| {
            role_check(req, next, vec![UserRole::Admin, UserRole::Coach])
        }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_categories(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let categories = service::question::list_categories(&app_state.db_client, &user.user).await?;

    Ok(Json(CategoryListResponseDto {
        status: "success".to_string(),
        categories,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_questions(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let questions = service::question::list_questions(&app_state.db_client, &user.user).await?;

    Ok(Json(QuestionListResponseDto {
        status: "success".to_string(),
        questions,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_category_questions(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(category_id): Path<i64>,
) -> Result<impl IntoResponse, HttpError> {
    let questions =
        service::question::get_category_questions(&app_state.db_client, category_id, &user.user)
            .await?;

    Ok(Json(QuestionListResponseDto {
        status: "success".to_string(),
        questions,
    }))
}

#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn rename_category(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(category_id): Path<i64>,
    Json(body): Json<CategoryRenameDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid rename_category input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let category = service::question::rename_category(
        &app_state.db_client,
        category_id,
        &body.name,
        &user.user,
    )
    .await?;

    Ok(Json(CategoryResponseDto {
        status: "success".to_string(),
        category,
    }))
}

/// Move a category to another position; the occupant takes the old position.
#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn reorder_category(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(category_id): Path<i64>,
    Json(body): Json<CategoryReorderDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid reorder_category input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let category = service::question::reorder_category(
        &app_state.db_client,
        category_id,
        body.category_order,
        &user.user,
    )
    .await?;

    tracing::info!(category_id, category_order = body.category_order, "Category moved");
    Ok(Json(CategoryResponseDto {
        status: "success".to_string(),
        category,
    }))
}

#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn update_question(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(question_id): Path<i64>,
    Json(body): Json<QuestionContentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_question input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let question = service::question::update_question_content(
        &app_state.db_client,
        question_id,
        &body.into(),
        &user.user,
    )
    .await?;

    Ok(Json(QuestionResponseDto {
        status: "success".to_string(),
        question,
    }))
}

/// Replace the whole catalog with the bundled defaults. Existing assessments
/// keep their frozen copies.
#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn reload_defaults(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    service::question::reload_defaults(&app_state.db_client, &user.user).await?;

    tracing::info!("Default catalog reloaded");
    Ok(Json(Response {
        status: "success",
        message: "Default questions loaded.".to_string(),
    }))
}
