use chrono::prelude::*;
use serde::{Deserialize, Serialize};

/// User role enumeration for role-based access control (RBAC)
///
/// Stored in SQLite as lowercase TEXT ("admin", "coach", "user").
/// Admins and coaches are "managers": they share almost every capability,
/// see `policy.rs` for the exact table.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin, // Full system access
    Coach, // Manages assessments, reports and users below admin
    User,  // The person being assessed
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Coach => "coach",
            UserRole::User => "user",
        }
    }
}

/// User model representing the users table
///
/// Security notes:
/// - `password`: argon2 PHC string, never the plain text
/// - `reset_token`: random token mailed for password reset (None when no reset is pending)
/// - `reset_token_expires_at`: reset links stop working after this instant
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String, // always stored lower-cased
    pub password: String,
    pub role: UserRole,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One of the 13 catalog categories (order 0..=12)
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct QuestionCategory {
    pub id: i64,
    pub name: String,
    pub category_order: i32,
}

/// Catalog question joined with its category
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Question {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub category_order: i32,
    pub question: String,
    pub question_description: String,
    pub question_order: i32, // 1..=4 inside the category
    pub option_yes: String,
    pub option_mid: String,
    pub option_no: String,
}

/// The three possible answers to a question.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnswerOption {
    Yes,
    Mid,
    No,
}

/// Assessment row with the owner and last editor usernames resolved.
///
/// Both names come from LEFT JOINs, so they are `None` when the referenced
/// user no longer exists.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Assessment {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub owner_name: Option<String>,
    pub last_editor: Option<String>,
    pub last_editor_name: Option<String>,
    pub last_edit: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Assessment as listed on the self-service surface
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct UserAssessment {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub assessment: Assessment,
    pub has_reports: bool, // at least one published report exists
}

/// Frozen category belonging to a single assessment
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct AssessmentQuestionCategory {
    pub id: i64,
    pub assessment_id: String,
    pub name: String,
    pub category_order: i32,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Answer {
    pub id: String,
    pub assessment_id: String,
    pub question_id: i64,
    pub answer_option: Option<AnswerOption>,
    pub answer_description: Option<String>,
}

/// One flattened questionnaire row: frozen question + category + answer.
///
/// A full assessment yields exactly 52 of these, ordered by
/// (category_order, question_order).
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct AssessmentQA {
    pub question_id: i64,
    pub question: String,
    pub question_description: String,
    pub question_order: i32,
    pub option_yes: String,
    pub option_mid: String,
    pub option_no: String,
    pub assessment_id: String,
    pub assessment_name: String,
    pub owner_id: String,
    pub last_edit: Option<DateTime<Utc>>,
    pub last_editor: Option<String>,
    pub category_id: i64,
    pub category_name: String,
    pub category_order: i32,
    pub answer_id: String,
    pub answer_option: Option<AnswerOption>,
    pub answer_description: Option<String>,
}

/// Coach notes for one (assessment, category) pair.
///
/// `content` is `None` until something is written; `Some(json!({}))` is a
/// different, explicitly empty note.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Note {
    pub id: i64,
    pub assessment_id: String,
    pub category_order: i32,
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Report {
    pub id: String,
    pub assessment_id: String,
    pub name: String,
    pub is_public: bool,
    pub share_key: String,
    pub wheel_filename: String,
    pub summary: Option<String>,
    pub recommendation_title_1: Option<String>,
    pub recommendation_content_1: Option<String>,
    pub recommendation_title_2: Option<String>,
    pub recommendation_content_2: Option<String>,
    pub recommendation_title_3: Option<String>,
    pub recommendation_content_3: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Report joined with the name and owner of its assessment, used for every
/// list and detail response.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct ReportExtended {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub report: Report,
    pub assessment_name: String,
    pub assessment_owner: Option<String>,
}
