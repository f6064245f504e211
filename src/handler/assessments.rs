use crate::{
    AppState,
    dtos::{
        AnswerResponseDto, AssessmentCategoriesResponseDto, AssessmentListResponseDto,
        AssessmentResponseDto, CategoryPageResponseDto, ChangeOwnerDto, CreateAssessmentDto,
        GridPosition, NoteListResponseDto, NoteResponseDto, NoteUpdateDto,
        QuestionAnswerListResponseDto, QuestionPageResponseDto, RenameDto, SaveAnswerDto,
    },
    error::HttpError,
    middleware::JWTAuthMiddleware,
    service,
    utils::grid,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use tracing::instrument;
use validator::Validate;

/// Assessments, their questionnaire and coach notes.
///
/// Managers reach every assessment; owners reach the read and answer routes
/// of their own. The service layer enforces both.
pub fn assessments_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_assessments).post(create_assessment))
        .route("/{assessment_id}", get(get_assessment).delete(delete_assessment))
        .route("/{assessment_id}/name", put(rename_assessment))
        .route("/{assessment_id}/owner", put(change_owner))
        .route("/{assessment_id}/categories", get(get_categories))
        .route(
            "/{assessment_id}/categories/{category_order}",
            get(get_category_page),
        )
        .route("/{assessment_id}/questions", get(get_question_answer_rows))
        .route(
            "/{assessment_id}/questions/{category_order}/{question_order}",
            get(get_question_page),
        )
        .route("/{assessment_id}/notes", get(get_notes))
        .route("/{assessment_id}/notes/{category_order}", get(get_note))
        .route("/answers/{answer_id}", put(save_answer))
        .route("/notes/{note_id}", get(get_note_by_id).put(update_note))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_assessments(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let assessments = service::assessment::list_all(&app_state.db_client, &user.user).await?;

    Ok(Json(AssessmentListResponseDto {
        status: "success".to_string(),
        results: assessments.len(),
        assessments,
    }))
}

/// Create an assessment, freezing the current catalog into it.
#[instrument(skip(user, app_state, body), fields(actor = %user.user.id, owner_id = %body.owner_id))]
pub async fn create_assessment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<CreateAssessmentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_assessment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let assessment = service::assessment::create(
        &app_state.db_client,
        &body.name,
        &body.owner_id,
        &user.user,
    )
    .await?;

    tracing::info!(assessment_id = %assessment.id, "Assessment created");
    Ok((
        StatusCode::CREATED,
        Json(AssessmentResponseDto {
            status: "success".to_string(),
            assessment,
        }),
    ))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_assessment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let assessment =
        service::assessment::get(&app_state.db_client, &assessment_id, &user.user).await?;

    Ok(Json(AssessmentResponseDto {
        status: "success".to_string(),
        assessment,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn delete_assessment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let assessment = service::assessment::delete(
        &app_state.db_client,
        &app_state.store,
        &assessment_id,
        &user.user,
    )
    .await?;

    Ok(Json(AssessmentResponseDto {
        status: "success".to_string(),
        assessment,
    }))
}

#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn rename_assessment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
    Json(body): Json<RenameDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid rename_assessment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let assessment = service::assessment::rename(
        &app_state.db_client,
        &assessment_id,
        &body.name,
        &user.user,
    )
    .await?;

    Ok(Json(AssessmentResponseDto {
        status: "success".to_string(),
        assessment,
    }))
}

#[instrument(skip(user, app_state, body), fields(actor = %user.user.id, owner_id = %body.owner_id))]
pub async fn change_owner(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
    Json(body): Json<ChangeOwnerDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid change_owner input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let assessment = service::assessment::change_owner(
        &app_state.db_client,
        &assessment_id,
        &body.owner_id,
        &user.user,
    )
    .await?;

    tracing::info!(assessment_id = %assessment.id, "Assessment owner changed");
    Ok(Json(AssessmentResponseDto {
        status: "success".to_string(),
        assessment,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_categories(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let categories =
        service::assessment::get_categories(&app_state.db_client, &assessment_id, &user.user)
            .await?;

    Ok(Json(AssessmentCategoriesResponseDto {
        status: "success".to_string(),
        categories,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_question_answer_rows(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let rows = service::assessment::get_all_question_answer_rows(
        &app_state.db_client,
        &assessment_id,
        &user.user,
    )
    .await?;

    Ok(Json(QuestionAnswerListResponseDto {
        status: "success".to_string(),
        rows,
    }))
}

/// One question with links to the previous and next grid positions.
#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_question_page(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((assessment_id, category_order, question_order)): Path<(String, i32, i32)>,
) -> Result<impl IntoResponse, HttpError> {
    let rows = service::assessment::get_all_question_answer_rows(
        &app_state.db_client,
        &assessment_id,
        &user.user,
    )
    .await?;

    let current = grid::current(&rows, category_order, question_order)?;
    let (previous, next) = grid::neighbours(&rows, category_order, question_order)?;

    Ok(Json(QuestionPageResponseDto {
        status: "success".to_string(),
        current: current.clone(),
        previous: previous.map(GridPosition::of),
        next: next.map(GridPosition::of),
    }))
}

/// The four questions of one category with the neighbouring category orders.
#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_category_page(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((assessment_id, category_order)): Path<(String, i32)>,
) -> Result<impl IntoResponse, HttpError> {
    let rows = service::assessment::get_all_question_answer_rows(
        &app_state.db_client,
        &assessment_id,
        &user.user,
    )
    .await?;

    let selected: Vec<_> = grid::filter_by_category(&rows, category_order)
        .into_iter()
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(HttpError::not_found(format!(
            "Category {} was not found.",
            category_order
        )));
    }
    let (previous_category, next_category) = grid::neighbouring_categories(category_order);

    Ok(Json(CategoryPageResponseDto {
        status: "success".to_string(),
        rows: selected,
        previous_category,
        next_category,
    }))
}

#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn save_answer(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(answer_id): Path<String>,
    Json(body): Json<SaveAnswerDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid save_answer input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let answer = service::assessment::save_answer(
        &app_state.db_client,
        &answer_id,
        body.answer_option,
        body.answer_description.as_deref(),
        &user.user,
    )
    .await?;

    Ok(Json(AnswerResponseDto {
        status: "success".to_string(),
        answer,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_notes(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let notes = service::note::list(&app_state.db_client, &assessment_id, &user.user).await?;

    Ok(Json(NoteListResponseDto {
        status: "success".to_string(),
        notes,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_note(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((assessment_id, category_order)): Path<(String, i32)>,
) -> Result<impl IntoResponse, HttpError> {
    let note =
        service::note::get(&app_state.db_client, &assessment_id, category_order, &user.user)
            .await?;

    Ok(Json(NoteResponseDto {
        status: "success".to_string(),
        note,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_note_by_id(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(note_id): Path<i64>,
) -> Result<impl IntoResponse, HttpError> {
    let note = service::note::get_by_id(&app_state.db_client, note_id, &user.user).await?;

    Ok(Json(NoteResponseDto {
        status: "success".to_string(),
        note,
    }))
}

/// Replace a note's content; `{"content": null}` clears it.
#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn update_note(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(note_id): Path<i64>,
    Json(body): Json<NoteUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let note =
        service::note::update(&app_state.db_client, note_id, body.content, &user.user).await?;

    Ok(Json(NoteResponseDto {
        status: "success".to_string(),
        note,
    }))
}
