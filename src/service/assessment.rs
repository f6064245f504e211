use crate::{
    db::{AssessmentExt, DBClient, QuestionExt, UserExt},
    error::ServiceError,
    models::{
        Answer, AnswerOption, Assessment, AssessmentQA, AssessmentQuestionCategory, User,
        UserAssessment,
    },
    policy::{self, Capability},
    service::hide_missing,
    storage::SnapshotStore,
    utils::grid::{CATEGORY_COUNT, QUESTIONS_PER_CATEGORY},
};

/// Load an assessment the actor may read: managers see all, users their own.
pub(crate) async fn load_accessible(
    db: &DBClient,
    assessment_id: &str,
    actor: &User,
) -> Result<Assessment, ServiceError> {
    let is_manager = policy::is_manager(actor.role);
    let assessment = db
        .get_assessment(assessment_id)
        .await
        .map_err(|e| hide_missing(e, is_manager))?;

    if is_manager || assessment.owner_id == actor.id {
        Ok(assessment)
    } else {
        Err(ServiceError::unauthorized(
            "You are not allowed to access this assessment.",
        ))
    }
}

/// Create an assessment for `owner_id` from a frozen copy of the catalog.
pub async fn create(
    db: &DBClient,
    name: &str,
    owner_id: &str,
    actor: &User,
) -> Result<Assessment, ServiceError> {
    policy::require(actor.role, Capability::ManageAssessments)?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid_input("Assessment name cannot be empty."));
    }

    db.get_user(Some(owner_id), None, None, None)
        .await?
        .ok_or_else(|| ServiceError::not_found("Assessment owner does not exist."))?;

    let questions = db.get_questions().await?;
    if questions.len() != (CATEGORY_COUNT * QUESTIONS_PER_CATEGORY) as usize {
        return Err(ServiceError::Internal(format!(
            "question catalog holds {} questions, expected {}",
            questions.len(),
            CATEGORY_COUNT * QUESTIONS_PER_CATEGORY
        )));
    }

    let assessment_id = db.create_assessment(name, owner_id).await?;
    tracing::info!(assessment_id = %assessment_id, owner_id, "Assessment created");
    Ok(db.get_assessment(&assessment_id).await?)
}

pub async fn get(
    db: &DBClient,
    assessment_id: &str,
    actor: &User,
) -> Result<Assessment, ServiceError> {
    load_accessible(db, assessment_id, actor).await
}

/// Self-service read: only the owner, whatever the role.
pub async fn get_for_user(
    db: &DBClient,
    assessment_id: &str,
    actor: &User,
) -> Result<Assessment, ServiceError> {
    let assessment = db
        .get_assessment(assessment_id)
        .await
        .map_err(|e| hide_missing(e, false))?;

    if assessment.owner_id != actor.id {
        return Err(ServiceError::unauthorized(
            "You are not allowed to access this assessment.",
        ));
    }
    Ok(assessment)
}

pub async fn list_all(db: &DBClient, actor: &User) -> Result<Vec<Assessment>, ServiceError> {
    policy::require(actor.role, Capability::ManageAssessments)?;
    Ok(db.get_assessments().await?)
}

pub async fn list_for_user(
    db: &DBClient,
    actor: &User,
) -> Result<Vec<UserAssessment>, ServiceError> {
    Ok(db.get_user_assessments(&actor.id).await?)
}

pub async fn get_categories(
    db: &DBClient,
    assessment_id: &str,
    actor: &User,
) -> Result<Vec<AssessmentQuestionCategory>, ServiceError> {
    load_accessible(db, assessment_id, actor).await?;
    Ok(db.get_assessment_categories(assessment_id).await?)
}

/// Delete an assessment and all it owns, its reports included.
///
/// Returns the assessment as it was. Report wheel files are removed after the
/// commit; failures there are only logged.
pub async fn delete(
    db: &DBClient,
    store: &SnapshotStore,
    assessment_id: &str,
    actor: &User,
) -> Result<Assessment, ServiceError> {
    policy::require(actor.role, Capability::ManageAssessments)?;

    let assessment = db.get_assessment(assessment_id).await?;
    let wheel_filenames = db.delete_assessment(assessment_id).await?;

    for filename in &wheel_filenames {
        store.remove_or_warn(filename).await;
    }

    tracing::info!(
        assessment_id,
        reports = wheel_filenames.len(),
        "Assessment deleted"
    );
    Ok(assessment)
}

/// Every question with its answer, ordered by category then question.
pub async fn get_all_question_answer_rows(
    db: &DBClient,
    assessment_id: &str,
    actor: &User,
) -> Result<Vec<AssessmentQA>, ServiceError> {
    load_accessible(db, assessment_id, actor).await?;
    Ok(db.get_question_answer_rows(assessment_id).await?)
}

/// Update an existing answer. Answers are never created here.
pub async fn save_answer(
    db: &DBClient,
    answer_id: &str,
    answer_option: Option<AnswerOption>,
    answer_description: Option<&str>,
    actor: &User,
) -> Result<Answer, ServiceError> {
    let is_manager = policy::is_manager(actor.role);
    let answer = db
        .get_answer(answer_id)
        .await
        .map_err(|e| hide_missing(e, is_manager))?;
    load_accessible(db, &answer.assessment_id, actor).await?;

    let saved = db
        .save_answer(answer_id, answer_option, answer_description, &actor.id)
        .await?;
    tracing::debug!(answer_id, "Answer saved");
    Ok(saved)
}

pub async fn rename(
    db: &DBClient,
    assessment_id: &str,
    new_name: &str,
    actor: &User,
) -> Result<Assessment, ServiceError> {
    policy::require(actor.role, Capability::ManageAssessments)?;
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(ServiceError::invalid_input("Assessment name cannot be empty."));
    }
    Ok(db.rename_assessment(assessment_id, new_name).await?)
}

pub async fn change_owner(
    db: &DBClient,
    assessment_id: &str,
    new_owner_id: &str,
    actor: &User,
) -> Result<Assessment, ServiceError> {
    policy::require(actor.role, Capability::ManageAssessments)?;
    db.get_user(Some(new_owner_id), None, None, None)
        .await?
        .ok_or_else(|| ServiceError::not_found("New owner does not exist."))?;
    Ok(db.change_assessment_owner(assessment_id, new_owner_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures::world;
    use crate::service::question::{self, QuestionContent};
    use crate::utils::grid;
    use std::collections::HashSet;

    #[tokio::test]
    async fn create_freezes_a_complete_grid() {
        let w = world().await;
        let assessment = create(&w.db, "Q1 Review", &w.alice.id, &w.admin).await.unwrap();
        assert_eq!(assessment.owner_name.as_deref(), Some("alice"));

        let rows = get_all_question_answer_rows(&w.db, &assessment.id, &w.admin)
            .await
            .unwrap();
        assert_eq!(rows.len(), 52);
        let positions: HashSet<(i32, i32)> = rows
            .iter()
            .map(|r| (r.category_order, r.question_order))
            .collect();
        assert_eq!(positions, grid::positions().into_iter().collect());
        assert!(rows.iter().all(|r| r.answer_option.is_none() && r.answer_description.is_none()));

        let categories = get_categories(&w.db, &assessment.id, &w.alice).await.unwrap();
        assert_eq!(categories.len(), 13);
    }

    #[tokio::test]
    async fn catalog_edits_do_not_reach_frozen_questions() {
        let w = world().await;
        let assessment = create(&w.db, "A", &w.alice.id, &w.coach).await.unwrap();
        let before = get_all_question_answer_rows(&w.db, &assessment.id, &w.coach)
            .await
            .unwrap();

        let catalog = question::list_questions(&w.db, &w.coach).await.unwrap();
        let content = QuestionContent {
            question: "Changed after freeze".into(),
            question_description: String::new(),
            option_yes: "y".into(),
            option_mid: "m".into(),
            option_no: "n".into(),
        };
        question::update_question_content(&w.db, catalog[0].id, &content, &w.coach)
            .await
            .unwrap();
        question::rename_category(&w.db, catalog[0].category_id, "Renamed", &w.coach)
            .await
            .unwrap();
        question::load_defaults(&w.db).await.unwrap();

        let after = get_all_question_answer_rows(&w.db, &assessment.id, &w.coach)
            .await
            .unwrap();
        let texts = |rows: &[AssessmentQA]| {
            rows.iter()
                .map(|r| (r.category_name.clone(), r.question.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(texts(&before), texts(&after));
    }

    #[tokio::test]
    async fn save_answer_updates_in_place() {
        let w = world().await;
        let assessment = create(&w.db, "A", &w.alice.id, &w.admin).await.unwrap();
        let rows = get_all_question_answer_rows(&w.db, &assessment.id, &w.alice)
            .await
            .unwrap();
        let first = grid::current(&rows, 0, 1).unwrap();

        let saved = save_answer(&w.db, &first.answer_id, Some(AnswerOption::Yes), None, &w.alice)
            .await
            .unwrap();
        assert_eq!(saved.answer_option, Some(AnswerOption::Yes));
        save_answer(&w.db, &first.answer_id, Some(AnswerOption::No), Some("later"), &w.coach)
            .await
            .unwrap();

        assert_eq!(w.db.get_answer_count(&assessment.id).await.unwrap(), 52);
        let stamped = get(&w.db, &assessment.id, &w.admin).await.unwrap();
        assert_eq!(stamped.last_editor_name.as_deref(), Some("coach"));
    }

    #[tokio::test]
    async fn other_users_cannot_read_or_answer() {
        let w = world().await;
        let assessment = create(&w.db, "A", &w.alice.id, &w.admin).await.unwrap();
        let rows = get_all_question_answer_rows(&w.db, &assessment.id, &w.alice)
            .await
            .unwrap();

        assert!(matches!(
            get(&w.db, &assessment.id, &w.bob).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            get(&w.db, "no-such-id", &w.bob).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            get(&w.db, "no-such-id", &w.admin).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            save_answer(&w.db, &rows[0].answer_id, Some(AnswerOption::Yes), None, &w.bob).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            get_for_user(&w.db, &assessment.id, &w.admin).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(get_for_user(&w.db, &assessment.id, &w.alice).await.is_ok());
    }

    #[tokio::test]
    async fn plain_users_cannot_manage() {
        let w = world().await;
        let existing = create(&w.db, "A", &w.alice.id, &w.admin).await.unwrap();
        let store = SnapshotStore::new(std::env::temp_dir());

        assert!(matches!(
            create(&w.db, "Mine", &w.alice.id, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            list_all(&w.db, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            delete(&w.db, &store, &existing.id, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            rename(&w.db, &existing.id, "x", &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert_eq!(list_all(&w.db, &w.admin).await.unwrap().len(), 1);
        assert_eq!(get(&w.db, &existing.id, &w.admin).await.unwrap().name, "A");
    }

    #[tokio::test]
    async fn create_needs_an_existing_owner() {
        let w = world().await;
        assert!(matches!(
            create(&w.db, "A", "ghost", &w.admin).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(list_all(&w.db, &w.admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_change_owner_and_delete() {
        let w = world().await;
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let assessment = create(&w.db, "A", &w.alice.id, &w.admin).await.unwrap();

        let renamed = rename(&w.db, &assessment.id, "B", &w.coach).await.unwrap();
        assert_eq!(renamed.name, "B");

        let moved = change_owner(&w.db, &assessment.id, &w.bob.id, &w.coach)
            .await
            .unwrap();
        assert_eq!(moved.owner_name.as_deref(), Some("bob"));
        assert_eq!(list_for_user(&w.db, &w.bob).await.unwrap().len(), 1);
        assert!(list_for_user(&w.db, &w.alice).await.unwrap().is_empty());

        let deleted = delete(&w.db, &store, &assessment.id, &w.admin).await.unwrap();
        assert_eq!(deleted.name, "B");
        assert!(matches!(
            get(&w.db, &assessment.id, &w.admin).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
