use crate::{
    AppState,
    dtos::{
        CreateReportDto, PublishDto, ReportListResponseDto, ReportResponseDto, Response,
        UpdateReportDto,
    },
    error::HttpError,
    middleware::JWTAuthMiddleware,
    service,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, put},
};
use tracing::instrument;
use validator::Validate;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// Report management for managers, plus the wheel image that owners may
/// also fetch once the report is published.
pub fn reports_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_reports).post(create_report))
        .route(
            "/{report_id}",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/{report_id}/publish", put(publish_report))
        .route("/{report_id}/wheel", get(get_wheel))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_reports(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let reports = service::report::list_all_extended(&app_state.db_client, &user.user).await?;

    Ok(Json(ReportListResponseDto {
        status: "success".to_string(),
        results: reports.len(),
        reports,
    }))
}

/// Create a draft report and snapshot the assessment's current answers as
/// its wheel.
#[instrument(
    skip(user, app_state, body),
    fields(actor = %user.user.id, assessment_id = %body.assessment_id)
)]
pub async fn create_report(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<CreateReportDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_report input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let report = service::report::create(
        &app_state.db_client,
        &app_state.store,
        &body.assessment_id,
        &body.name,
        &user.user,
    )
    .await?;
    let report = service::report::extend(&app_state.db_client, &report, &user.user).await?;

    tracing::info!(report_id = %report.report.id, "Report created");
    Ok((
        StatusCode::CREATED,
        Json(ReportResponseDto {
            status: "success".to_string(),
            report,
            mail_warning: None,
        }),
    ))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_report(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let report = service::report::get_extended(&app_state.db_client, &report_id, &user.user).await?;

    Ok(Json(ReportResponseDto {
        status: "success".to_string(),
        report,
        mail_warning: None,
    }))
}

#[instrument(skip(user, app_state, body), fields(actor = %user.user.id))]
pub async fn update_report(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(report_id): Path<String>,
    Json(body): Json<UpdateReportDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_report input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let payload_id = body.id.clone();
    let report = service::report::update(
        &app_state.db_client,
        &report_id,
        &payload_id,
        &body.into(),
        &user.user,
    )
    .await?;
    let report = service::report::extend(&app_state.db_client, &report, &user.user).await?;

    Ok(Json(ReportResponseDto {
        status: "success".to_string(),
        report,
        mail_warning: None,
    }))
}

/// Publish or unpublish. Publishing mails the assessment owner; a failed
/// mail comes back as `mail_warning`.
#[instrument(
    skip(user, app_state, body),
    fields(actor = %user.user.id, is_public = body.is_public)
)]
pub async fn publish_report(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(report_id): Path<String>,
    Json(body): Json<PublishDto>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = service::report::publish(
        &app_state.db_client,
        &app_state.mailer,
        &app_state.env.frontend_url,
        &report_id,
        body.is_public,
        &user.user,
    )
    .await?;
    let report =
        service::report::extend(&app_state.db_client, &outcome.report, &user.user).await?;

    Ok(Json(ReportResponseDto {
        status: "success".to_string(),
        report,
        mail_warning: outcome.mail_warning,
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn delete_report(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let report = service::report::delete(
        &app_state.db_client,
        &app_state.store,
        &report_id,
        &user.user,
    )
    .await?;

    Ok(Json(Response {
        status: "success",
        message: format!("Report {} deleted.", report.name),
    }))
}

#[instrument(skip(user, app_state), fields(actor = %user.user.id))]
pub async fn get_wheel(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let svg = service::report::wheel_svg(
        &app_state.db_client,
        &app_state.store,
        &report_id,
        &user.user,
    )
    .await?;

    Ok(([(header::CONTENT_TYPE, SVG_CONTENT_TYPE)], svg))
}
