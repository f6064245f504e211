use crate::{
    db::ReportContent,
    models::{
        AnswerOption, Assessment, AssessmentQA, AssessmentQuestionCategory, Note, Question,
        QuestionCategory, ReportExtended, User, UserAssessment, UserRole,
    },
    service::{question::QuestionContent, user::{NewUser, UserUpdate}},
    utils::token::ExpiryStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// Request bodies are validated here for shape only; business rules such as
// password length and role grants live in the service layer.

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Login request - accepts email or username
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub access_token: String,
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenStatusResponseDto {
    pub status: String,
    pub token_status: ExpiryStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponseDto {
    pub status: String,
    pub access_token: String,
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone)]
pub struct ForgotPasswordRequestDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ResetPasswordRequestDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,

    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,

    #[validate(must_match(other = "new_password", message = "new passwords do not match"))]
    pub new_password_confirm: String,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

// ============================================================================
// User DTOs
// ============================================================================

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserDto {
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    pub role: UserRole,
}

impl From<CreateUserDto> for NewUser {
    fn from(dto: CreateUserDto) -> Self {
        NewUser {
            username: dto.username,
            email: dto.email,
            password: dto.password,
            role: dto.role,
        }
    }
}

/// Full user replacement; `password` is only changed when present.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserDto {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: String,

    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    pub role: UserRole,

    pub password: Option<String>,
}

impl From<UpdateUserDto> for UserUpdate {
    fn from(dto: UpdateUserDto) -> Self {
        UserUpdate {
            id: dto.id,
            username: dto.username,
            email: dto.email,
            role: dto.role,
            password: dto.password.filter(|p| !p.is_empty()),
        }
    }
}

/// User as sent to clients, without the password hash or reset token
#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_owned(),
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub user: FilterUserDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponseDto {
    pub status: String,
    pub users: Vec<FilterUserDto>,
    pub results: usize,
}

// ============================================================================
// Question catalog DTOs
// ============================================================================

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRenameDto {
    #[validate(length(min = 1, max = 255, message = "Category name is required"))]
    pub name: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReorderDto {
    #[validate(range(min = 0, max = 12, message = "Category order must be between 0 and 12"))]
    pub category_order: i32,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionContentDto {
    #[validate(length(min = 1, message = "Question is required"))]
    pub question: String,
    #[serde(default)]
    pub question_description: String,
    #[serde(default)]
    pub option_yes: String,
    #[serde(default)]
    pub option_mid: String,
    #[serde(default)]
    pub option_no: String,
}

impl From<QuestionContentDto> for QuestionContent {
    fn from(dto: QuestionContentDto) -> Self {
        QuestionContent {
            question: dto.question,
            question_description: dto.question_description,
            option_yes: dto.option_yes,
            option_mid: dto.option_mid,
            option_no: dto.option_no,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResponseDto {
    pub status: String,
    pub category: QuestionCategory,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryListResponseDto {
    pub status: String,
    pub categories: Vec<QuestionCategory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponseDto {
    pub status: String,
    pub question: Question,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionListResponseDto {
    pub status: String,
    pub questions: Vec<Question>,
}

// ============================================================================
// Assessment DTOs
// ============================================================================

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssessmentDto {
    #[validate(length(min = 1, max = 255, message = "Assessment name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Owner is required"))]
    pub owner_id: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RenameDto {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ChangeOwnerDto {
    #[validate(length(min = 1, message = "Owner is required"))]
    pub owner_id: String,
}

/// Answer update; a missing option clears the answer.
#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveAnswerDto {
    pub answer_option: Option<AnswerOption>,

    #[validate(length(max = 4000, message = "Answer description is too long"))]
    pub answer_description: Option<String>,
}

/// Note body; `content: null` clears the note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteUpdateDto {
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssessmentResponseDto {
    pub status: String,
    pub assessment: Assessment,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssessmentListResponseDto {
    pub status: String,
    pub assessments: Vec<Assessment>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserAssessmentListResponseDto {
    pub status: String,
    pub assessments: Vec<UserAssessment>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssessmentCategoriesResponseDto {
    pub status: String,
    pub categories: Vec<AssessmentQuestionCategory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionAnswerListResponseDto {
    pub status: String,
    pub rows: Vec<AssessmentQA>,
}

/// One questionnaire page: the current row and the positions around it.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionPageResponseDto {
    pub status: String,
    pub current: AssessmentQA,
    pub previous: Option<GridPosition>,
    pub next: Option<GridPosition>,
}

/// All rows of one category plus the neighbouring category orders.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryPageResponseDto {
    pub status: String,
    pub rows: Vec<AssessmentQA>,
    pub previous_category: Option<i32>,
    pub next_category: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPosition {
    pub category_order: i32,
    pub question_order: i32,
}

impl GridPosition {
    pub fn of(row: &AssessmentQA) -> Self {
        GridPosition {
            category_order: row.category_order,
            question_order: row.question_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponseDto {
    pub status: String,
    pub answer: crate::models::Answer,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteResponseDto {
    pub status: String,
    pub note: Note,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteListResponseDto {
    pub status: String,
    pub notes: Vec<Note>,
}

// ============================================================================
// Report DTOs
// ============================================================================

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateReportDto {
    #[validate(length(min = 1, message = "Assessment is required"))]
    pub assessment_id: String,

    #[validate(length(min = 1, max = 255, message = "Report name is required"))]
    pub name: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct PublishDto {
    pub is_public: bool,
}

/// Editable report text. `id` must repeat the id from the path.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReportDto {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: String,

    #[validate(length(min = 1, max = 255, message = "Report name is required"))]
    pub name: String,

    pub summary: Option<String>,
    pub recommendation_title_1: Option<String>,
    pub recommendation_content_1: Option<String>,
    pub recommendation_title_2: Option<String>,
    pub recommendation_content_2: Option<String>,
    pub recommendation_title_3: Option<String>,
    pub recommendation_content_3: Option<String>,
}

impl From<UpdateReportDto> for ReportContent {
    fn from(dto: UpdateReportDto) -> Self {
        ReportContent {
            name: dto.name,
            summary: dto.summary,
            recommendation_title_1: dto.recommendation_title_1,
            recommendation_content_1: dto.recommendation_content_1,
            recommendation_title_2: dto.recommendation_title_2,
            recommendation_content_2: dto.recommendation_content_2,
            recommendation_title_3: dto.recommendation_title_3,
            recommendation_content_3: dto.recommendation_content_3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponseDto {
    pub status: String,
    pub report: ReportExtended,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportListResponseDto {
    pub status: String,
    pub reports: Vec<ReportExtended>,
    pub results: usize,
}
