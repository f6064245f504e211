use super::DBClient;
use crate::models::{Report, ReportExtended};
use chrono::Utc;
use sqlx::SqliteConnection;

const REPORT_COLUMNS: &str = "id, assessment_id, name, is_public, share_key, wheel_filename, \
    summary, recommendation_title_1, recommendation_content_1, recommendation_title_2, \
    recommendation_content_2, recommendation_title_3, recommendation_content_3, created_at";

const EXTENDED_SELECT: &str = "SELECT r.id, r.assessment_id, r.name, r.is_public, r.share_key, \
    r.wheel_filename, r.summary, r.recommendation_title_1, r.recommendation_content_1, \
    r.recommendation_title_2, r.recommendation_content_2, r.recommendation_title_3, \
    r.recommendation_content_3, r.created_at, \
    a.name AS assessment_name, u.username AS assessment_owner \
    FROM reports r \
    JOIN assessments a ON a.id = r.assessment_id \
    LEFT JOIN users u ON u.id = a.owner_id";

/// Editable report fields
#[derive(Debug, Clone, Default)]
pub struct ReportContent {
    pub name: String,
    pub summary: Option<String>,
    pub recommendation_title_1: Option<String>,
    pub recommendation_content_1: Option<String>,
    pub recommendation_title_2: Option<String>,
    pub recommendation_content_2: Option<String>,
    pub recommendation_title_3: Option<String>,
    pub recommendation_content_3: Option<String>,
}

/// Insert a draft report on an open connection, usually inside a transaction
/// that also covers writing its wheel file.
pub async fn insert_report(
    conn: &mut SqliteConnection,
    report_id: &str,
    assessment_id: &str,
    name: &str,
    share_key: &str,
    wheel_filename: &str,
) -> Result<Report, sqlx::Error> {
    let sql = format!(
        "INSERT INTO reports (id, assessment_id, name, is_public, share_key, wheel_filename, created_at) \
         VALUES (?, ?, ?, 0, ?, ?, ?) RETURNING {REPORT_COLUMNS}"
    );
    sqlx::query_as::<_, Report>(&sql)
        .bind(report_id)
        .bind(assessment_id)
        .bind(name)
        .bind(share_key)
        .bind(wheel_filename)
        .bind(Utc::now())
        .fetch_one(conn)
        .await
}

pub trait ReportExt {
    async fn get_report(&self, report_id: &str) -> Result<Report, sqlx::Error>;

    async fn get_report_extended(&self, report_id: &str) -> Result<ReportExtended, sqlx::Error>;

    async fn get_reports_extended(&self) -> Result<Vec<ReportExtended>, sqlx::Error>;

    async fn get_public_reports_for_assessment(
        &self,
        assessment_id: &str,
    ) -> Result<Vec<ReportExtended>, sqlx::Error>;

    /// Published report carrying `share_key`
    async fn get_shared_report(&self, share_key: &str) -> Result<ReportExtended, sqlx::Error>;

    async fn set_report_public(&self, report_id: &str, is_public: bool)
    -> Result<Report, sqlx::Error>;

    async fn update_report(
        &self,
        report_id: &str,
        content: &ReportContent,
    ) -> Result<Report, sqlx::Error>;

    /// Delete the row and return it, so the caller can clean up its wheel file
    async fn delete_report(&self, report_id: &str) -> Result<Report, sqlx::Error>;
}

impl ReportExt for DBClient {
    async fn get_report(&self, report_id: &str) -> Result<Report, sqlx::Error> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?");
        sqlx::query_as::<_, Report>(&sql)
            .bind(report_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_report_extended(&self, report_id: &str) -> Result<ReportExtended, sqlx::Error> {
        let sql = format!("{EXTENDED_SELECT} WHERE r.id = ?");
        sqlx::query_as::<_, ReportExtended>(&sql)
            .bind(report_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_reports_extended(&self) -> Result<Vec<ReportExtended>, sqlx::Error> {
        let sql = format!("{EXTENDED_SELECT} ORDER BY r.created_at DESC");
        sqlx::query_as::<_, ReportExtended>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_public_reports_for_assessment(
        &self,
        assessment_id: &str,
    ) -> Result<Vec<ReportExtended>, sqlx::Error> {
        let sql = format!(
            "{EXTENDED_SELECT} WHERE r.assessment_id = ? AND r.is_public = 1 \
             ORDER BY r.created_at DESC"
        );
        sqlx::query_as::<_, ReportExtended>(&sql)
            .bind(assessment_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_shared_report(&self, share_key: &str) -> Result<ReportExtended, sqlx::Error> {
        let sql = format!("{EXTENDED_SELECT} WHERE r.share_key = ? AND r.is_public = 1");
        sqlx::query_as::<_, ReportExtended>(&sql)
            .bind(share_key)
            .fetch_one(&self.pool)
            .await
    }

    async fn set_report_public(
        &self,
        report_id: &str,
        is_public: bool,
    ) -> Result<Report, sqlx::Error> {
        let sql = format!("UPDATE reports SET is_public = ? WHERE id = ? RETURNING {REPORT_COLUMNS}");
        sqlx::query_as::<_, Report>(&sql)
            .bind(is_public)
            .bind(report_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_report(
        &self,
        report_id: &str,
        content: &ReportContent,
    ) -> Result<Report, sqlx::Error> {
        let sql = format!(
            "UPDATE reports SET name = ?, summary = ?, \
             recommendation_title_1 = ?, recommendation_content_1 = ?, \
             recommendation_title_2 = ?, recommendation_content_2 = ?, \
             recommendation_title_3 = ?, recommendation_content_3 = ? \
             WHERE id = ? RETURNING {REPORT_COLUMNS}"
        );
        sqlx::query_as::<_, Report>(&sql)
            .bind(&content.name)
            .bind(&content.summary)
            .bind(&content.recommendation_title_1)
            .bind(&content.recommendation_content_1)
            .bind(&content.recommendation_title_2)
            .bind(&content.recommendation_content_2)
            .bind(&content.recommendation_title_3)
            .bind(&content.recommendation_content_3)
            .bind(report_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_report(&self, report_id: &str) -> Result<Report, sqlx::Error> {
        let sql = format!("DELETE FROM reports WHERE id = ? RETURNING {REPORT_COLUMNS}");
        sqlx::query_as::<_, Report>(&sql)
            .bind(report_id)
            .fetch_one(&self.pool)
            .await
    }
}
