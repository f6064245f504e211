use crate::{
    db::{DBClient, NewCategory, QuestionExt},
    error::ServiceError,
    models::{Question, QuestionCategory, User},
    policy::{self, Capability},
    utils::grid::{CATEGORY_COUNT, QUESTIONS_PER_CATEGORY},
};

const DEFAULT_QUESTIONS: &str = include_str!("default_questions.json");

/// New texts for a catalog question
#[derive(Debug, Clone)]
pub struct QuestionContent {
    pub question: String,
    pub question_description: String,
    pub option_yes: String,
    pub option_mid: String,
    pub option_no: String,
}

pub fn default_catalog() -> Result<Vec<NewCategory>, ServiceError> {
    let categories: Vec<NewCategory> = serde_json::from_str(DEFAULT_QUESTIONS)
        .map_err(|e| ServiceError::Internal(format!("default questions: {e}")))?;

    let well_formed = categories.len() == CATEGORY_COUNT as usize
        && categories
            .iter()
            .all(|c| c.questions.len() == QUESTIONS_PER_CATEGORY as usize);
    if !well_formed {
        return Err(ServiceError::Internal(
            "default questions must hold 13 categories of 4 questions".to_string(),
        ));
    }
    Ok(categories)
}

/// Replace the whole catalog with the bundled defaults.
pub async fn load_defaults(db: &DBClient) -> Result<(), ServiceError> {
    let catalog = default_catalog()?;
    db.replace_catalog(&catalog).await?;
    tracing::info!("Default question catalog loaded");
    Ok(())
}

/// Manager-triggered reload of the defaults
pub async fn reload_defaults(db: &DBClient, actor: &User) -> Result<(), ServiceError> {
    policy::require(actor.role, Capability::ManageQuestions)?;
    load_defaults(db).await
}

/// Load the defaults when the catalog is empty. Returns whether it loaded.
pub async fn ensure_catalog(db: &DBClient) -> Result<bool, ServiceError> {
    if db.get_category_count().await? > 0 {
        return Ok(false);
    }
    load_defaults(db).await?;
    Ok(true)
}

pub async fn list_categories(
    db: &DBClient,
    actor: &User,
) -> Result<Vec<QuestionCategory>, ServiceError> {
    policy::require(actor.role, Capability::ManageQuestions)?;
    Ok(db.get_categories().await?)
}

pub async fn list_questions(db: &DBClient, actor: &User) -> Result<Vec<Question>, ServiceError> {
    policy::require(actor.role, Capability::ManageQuestions)?;
    Ok(db.get_questions().await?)
}

pub async fn get_category_questions(
    db: &DBClient,
    category_id: i64,
    actor: &User,
) -> Result<Vec<Question>, ServiceError> {
    policy::require(actor.role, Capability::ManageQuestions)?;
    db.get_category(category_id).await?;
    Ok(db.get_category_questions(category_id).await?)
}

pub async fn rename_category(
    db: &DBClient,
    category_id: i64,
    new_name: &str,
    actor: &User,
) -> Result<QuestionCategory, ServiceError> {
    policy::require(actor.role, Capability::ManageQuestions)?;
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(ServiceError::invalid_input("Category name cannot be empty."));
    }
    Ok(db.rename_category(category_id, new_name).await?)
}

/// Move a category; the category already holding `new_order` takes the old slot.
pub async fn reorder_category(
    db: &DBClient,
    category_id: i64,
    new_order: i32,
    actor: &User,
) -> Result<QuestionCategory, ServiceError> {
    policy::require(actor.role, Capability::ManageQuestions)?;
    if !(0..CATEGORY_COUNT).contains(&new_order) {
        return Err(ServiceError::invalid_input(format!(
            "Category order must be between 0 and {}.",
            CATEGORY_COUNT - 1
        )));
    }
    Ok(db.move_category(category_id, new_order).await?)
}

pub async fn update_question_content(
    db: &DBClient,
    question_id: i64,
    content: &QuestionContent,
    actor: &User,
) -> Result<Question, ServiceError> {
    policy::require(actor.role, Capability::ManageQuestions)?;
    if content.question.trim().is_empty() {
        return Err(ServiceError::invalid_input("Question text cannot be empty."));
    }
    Ok(db
        .update_question(
            question_id,
            &content.question,
            &content.question_description,
            &content.option_yes,
            &content.option_mid,
            &content.option_no,
        )
        .await?)
}
