use crate::{
    AppState,
    dtos::{
        AssessmentResponseDto, ReportListResponseDto, ReportResponseDto,
        UserAssessmentListResponseDto,
    },
    error::HttpError,
    handler::reports::SVG_CONTENT_TYPE,
    middleware::JWTAuthMiddleware,
    service,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;

/// Self-service surface: what the logged-in user owns, whatever their role.
pub fn app_handler() -> Router<AppState> {
    Router::new()
        .route("/assessments", get(get_my_assessments))
        .route("/assessments/{assessment_id}", get(get_my_assessment))
        .route("/assessments/{assessment_id}/reports", get(get_my_reports))
        .route("/reports/{report_id}", get(get_my_report))
}

/// Published reports by share key. Mounted without the auth middleware.
pub fn shared_handler() -> Router<AppState> {
    Router::new()
        .route("/{share_key}", get(get_shared_report))
        .route("/{share_key}/wheel", get(get_shared_wheel))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_my_assessments(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let assessments =
        service::assessment::list_for_user(&app_state.db_client, &user.user).await?;

    Ok(Json(UserAssessmentListResponseDto {
        status: "success".to_string(),
        results: assessments.len(),
        assessments,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_my_assessment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let assessment =
        service::assessment::get_for_user(&app_state.db_client, &assessment_id, &user.user)
            .await?;

    Ok(Json(AssessmentResponseDto {
        status: "success".to_string(),
        assessment,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_my_reports(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let reports = service::report::get_public_for_assessment(
        &app_state.db_client,
        &assessment_id,
        &user.user,
    )
    .await?;

    Ok(Json(ReportListResponseDto {
        status: "success".to_string(),
        results: reports.len(),
        reports,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_my_report(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let report =
        service::report::get_public_for_user(&app_state.db_client, &report_id, &user.user)
            .await?;

    Ok(Json(ReportResponseDto {
        status: "success".to_string(),
        report,
        mail_warning: None,
    }))
}

#[instrument(skip_all)]
pub async fn get_shared_report(
    State(app_state): State<AppState>,
    Path(share_key): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let report = service::report::get_shared(&app_state.db_client, &share_key).await?;

    Ok(Json(ReportResponseDto {
        status: "success".to_string(),
        report,
        mail_warning: None,
    }))
}

#[instrument(skip_all)]
pub async fn get_shared_wheel(
    State(app_state): State<AppState>,
    Path(share_key): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let svg =
        service::report::shared_wheel_svg(&app_state.db_client, &app_state.store, &share_key)
            .await?;

    Ok(([(header::CONTENT_TYPE, SVG_CONTENT_TYPE)], svg))
}
