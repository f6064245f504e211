use uuid::Uuid;

use crate::{
    db::{AssessmentExt, DBClient, ReportContent, ReportExt, UserExt, insert_report},
    error::ServiceError,
    mail::{Mailer, mails::send_report_published_email},
    models::{Report, ReportExtended, User},
    policy::{self, Capability},
    service::hide_missing,
    storage::SnapshotStore,
    utils::{
        random::url_safe_token,
        wheel::{prepare_context, render_svg},
    },
};

/// Result of a publish toggle; `mail_warning` is set when the owner could not be notified.
#[derive(Debug)]
pub struct PublishOutcome {
    pub report: Report,
    pub mail_warning: Option<String>,
}

/// Create a draft report and its wheel snapshot.
///
/// The row is inserted in a transaction that only commits once the SVG is on
/// disk; if the commit itself fails the file is removed again.
pub async fn create(
    db: &DBClient,
    store: &SnapshotStore,
    assessment_id: &str,
    name: &str,
    actor: &User,
) -> Result<Report, ServiceError> {
    policy::require(actor.role, Capability::ManageReports)?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid_input("Report name cannot be empty."));
    }

    db.get_assessment(assessment_id).await?;
    let rows = db.get_question_answer_rows(assessment_id).await?;
    let svg = render_svg(&prepare_context(&rows));

    let report_id = Uuid::new_v4().to_string();
    let wheel_filename = SnapshotStore::new_filename();
    let share_key = url_safe_token();

    let mut tx = db.begin().await?;
    let report = insert_report(
        &mut tx,
        &report_id,
        assessment_id,
        name,
        &share_key,
        &wheel_filename,
    )
    .await?;

    if let Err(e) = store.write(&wheel_filename, &svg).await {
        if let Err(rollback) = tx.rollback().await {
            tracing::warn!("Rollback after snapshot failure failed: {}", rollback);
        }
        return Err(ServiceError::Storage(e));
    }

    if let Err(e) = tx.commit().await {
        store.remove_or_warn(&wheel_filename).await;
        return Err(e.into());
    }

    tracing::info!(report_id = %report.id, assessment_id, "Report created");
    Ok(report)
}

/// Toggle publication. Publishing mails the assessment owner; mail problems
/// are reported back as a warning, the toggle stands.
pub async fn publish(
    db: &DBClient,
    mailer: &Mailer,
    frontend_url: &str,
    report_id: &str,
    is_public: bool,
    actor: &User,
) -> Result<PublishOutcome, ServiceError> {
    policy::require(actor.role, Capability::ManageReports)?;

    let report = db.set_report_public(report_id, is_public).await?;
    tracing::info!(report_id, is_public, "Report publication changed");

    let mail_warning = if is_public && policy::has_capability(actor.role, Capability::SendEmails) {
        notify_owner(db, mailer, frontend_url, &report, actor)
            .await
            .err()
            .map(|warning| {
                tracing::warn!(report_id, "Report published but owner not notified: {}", warning);
                warning
            })
    } else {
        None
    };

    Ok(PublishOutcome {
        report,
        mail_warning,
    })
}

async fn notify_owner(
    db: &DBClient,
    mailer: &Mailer,
    frontend_url: &str,
    report: &Report,
    actor: &User,
) -> Result<(), String> {
    let assessment = db
        .get_assessment(&report.assessment_id)
        .await
        .map_err(|e| e.to_string())?;
    let owner = db
        .get_user(Some(&assessment.owner_id), None, None, None)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Report owner seems not to exist.".to_string())?;

    send_report_published_email(
        mailer,
        &owner.email,
        &owner.username,
        &actor.email,
        &report.name,
        frontend_url,
    )
    .await
    .map_err(|e| e.to_string())
}

/// Replace name, summary and recommendations. `payload_id` must match `report_id`.
pub async fn update(
    db: &DBClient,
    report_id: &str,
    payload_id: &str,
    content: &ReportContent,
    actor: &User,
) -> Result<Report, ServiceError> {
    policy::require(actor.role, Capability::ManageReports)?;
    if report_id != payload_id {
        return Err(ServiceError::data_mismatch(
            "Report id in the path does not match the payload.",
        ));
    }
    if content.name.trim().is_empty() {
        return Err(ServiceError::invalid_input("Report name cannot be empty."));
    }
    Ok(db.update_report(report_id, content).await?)
}

/// Delete the row, then the wheel file. A file that cannot be removed is logged only.
pub async fn delete(
    db: &DBClient,
    store: &SnapshotStore,
    report_id: &str,
    actor: &User,
) -> Result<Report, ServiceError> {
    policy::require(actor.role, Capability::ManageReports)?;
    let report = db.delete_report(report_id).await?;
    store.remove_or_warn(&report.wheel_filename).await;
    tracing::info!(report_id, "Report deleted");
    Ok(report)
}

/// Published reports of an assessment, for its owner only.
pub async fn get_public_for_assessment(
    db: &DBClient,
    assessment_id: &str,
    actor: &User,
) -> Result<Vec<ReportExtended>, ServiceError> {
    let assessment = db
        .get_assessment(assessment_id)
        .await
        .map_err(|e| hide_missing(e, false))?;
    if assessment.owner_id != actor.id {
        return Err(ServiceError::unauthorized(
            "You are not allowed to access these reports.",
        ));
    }
    Ok(db.get_public_reports_for_assessment(assessment_id).await?)
}

/// One published report, for the owner of its assessment only.
pub async fn get_public_for_user(
    db: &DBClient,
    report_id: &str,
    actor: &User,
) -> Result<ReportExtended, ServiceError> {
    let report = db
        .get_report_extended(report_id)
        .await
        .map_err(|e| hide_missing(e, false))?;
    let assessment = db.get_assessment(&report.report.assessment_id).await?;

    if assessment.owner_id != actor.id || !report.report.is_public {
        return Err(ServiceError::unauthorized(
            "You are not allowed to access this report.",
        ));
    }
    Ok(report)
}

pub async fn extend(
    db: &DBClient,
    report: &Report,
    actor: &User,
) -> Result<ReportExtended, ServiceError> {
    policy::require(actor.role, Capability::ManageReports)?;
    Ok(db.get_report_extended(&report.id).await?)
}

pub async fn list_all_extended(
    db: &DBClient,
    actor: &User,
) -> Result<Vec<ReportExtended>, ServiceError> {
    policy::require(actor.role, Capability::ManageReports)?;
    Ok(db.get_reports_extended().await?)
}

pub async fn get_extended(
    db: &DBClient,
    report_id: &str,
    actor: &User,
) -> Result<ReportExtended, ServiceError> {
    policy::require(actor.role, Capability::ManageReports)?;
    Ok(db.get_report_extended(report_id).await?)
}

/// Anonymous access through the share key; drafts look like missing reports.
pub async fn get_shared(db: &DBClient, share_key: &str) -> Result<ReportExtended, ServiceError> {
    db.get_shared_report(share_key)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ServiceError::not_found("Report was not found."),
            other => other.into(),
        })
}

/// Wheel SVG of a report: managers always, the owner once published.
pub async fn wheel_svg(
    db: &DBClient,
    store: &SnapshotStore,
    report_id: &str,
    actor: &User,
) -> Result<String, ServiceError> {
    let report = if policy::has_capability(actor.role, Capability::ManageReports) {
        db.get_report(report_id).await?
    } else {
        get_public_for_user(db, report_id, actor).await?.report
    };
    Ok(store.read(&report.wheel_filename).await?)
}

pub async fn shared_wheel_svg(
    db: &DBClient,
    store: &SnapshotStore,
    share_key: &str,
) -> Result<String, ServiceError> {
    let report = get_shared(db, share_key).await?;
    Ok(store.read(&report.report.wheel_filename).await?)
}
