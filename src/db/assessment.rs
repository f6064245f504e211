use std::collections::HashMap;

use super::DBClient;
use crate::models::{
    Answer, AnswerOption, Assessment, AssessmentQA, AssessmentQuestionCategory, Question,
    QuestionCategory, UserAssessment,
};
use chrono::Utc;
use uuid::Uuid;

const ASSESSMENT_SELECT: &str = "SELECT a.id, a.name, a.owner_id, o.username AS owner_name, \
    a.last_editor, e.username AS last_editor_name, a.last_edit, a.created_at \
    FROM assessments a \
    LEFT JOIN users o ON o.id = a.owner_id \
    LEFT JOIN users e ON e.id = a.last_editor";

const QA_SELECT: &str = "SELECT q.id AS question_id, q.question, q.question_description, \
    q.question_order, q.option_yes, q.option_mid, q.option_no, \
    a.id AS assessment_id, a.name AS assessment_name, a.owner_id, a.last_edit, a.last_editor, \
    c.id AS category_id, c.name AS category_name, c.category_order, \
    ans.id AS answer_id, ans.answer_option, ans.answer_description \
    FROM assessments_questions q \
    JOIN assessments_questions_categories c ON c.id = q.category_id \
    JOIN assessments a ON a.id = q.assessment_id \
    JOIN assessments_answers ans ON ans.question_id = q.id";

pub trait AssessmentExt {
    /// Create an assessment and freeze the current catalog into it.
    ///
    /// One transaction: the assessment, its categories, questions, one empty
    /// answer per question and one empty note per category. Returns the new id.
    async fn create_assessment(&self, name: &str, owner_id: &str) -> Result<String, sqlx::Error>;

    async fn get_assessment(&self, assessment_id: &str) -> Result<Assessment, sqlx::Error>;

    async fn get_assessments(&self) -> Result<Vec<Assessment>, sqlx::Error>;

    /// Assessments owned by `owner_id`, flagged when a published report exists
    async fn get_user_assessments(&self, owner_id: &str)
    -> Result<Vec<UserAssessment>, sqlx::Error>;

    async fn get_assessment_categories(
        &self,
        assessment_id: &str,
    ) -> Result<Vec<AssessmentQuestionCategory>, sqlx::Error>;

    /// Flattened questionnaire ordered by (category_order, question_order)
    async fn get_question_answer_rows(
        &self,
        assessment_id: &str,
    ) -> Result<Vec<AssessmentQA>, sqlx::Error>;

    async fn get_answer(&self, answer_id: &str) -> Result<Answer, sqlx::Error>;

    #[cfg(test)]
    async fn get_answer_count(&self, assessment_id: &str) -> Result<i64, sqlx::Error>;

    /// Update an answer in place and stamp the assessment's last editor.
    async fn save_answer(
        &self,
        answer_id: &str,
        answer_option: Option<AnswerOption>,
        answer_description: Option<&str>,
        editor_id: &str,
    ) -> Result<Answer, sqlx::Error>;

    async fn rename_assessment(
        &self,
        assessment_id: &str,
        name: &str,
    ) -> Result<Assessment, sqlx::Error>;

    async fn change_assessment_owner(
        &self,
        assessment_id: &str,
        owner_id: &str,
    ) -> Result<Assessment, sqlx::Error>;

    /// Delete an assessment with everything it owns, reports included.
    /// Returns the wheel filenames of the deleted reports.
    async fn delete_assessment(&self, assessment_id: &str) -> Result<Vec<String>, sqlx::Error>;
}

impl AssessmentExt for DBClient {
    async fn create_assessment(&self, name: &str, owner_id: &str) -> Result<String, sqlx::Error> {
        let assessment_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO assessments (id, name, owner_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&assessment_id)
            .bind(name)
            .bind(owner_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let categories = sqlx::query_as::<_, QuestionCategory>(
            "SELECT id, name, category_order FROM questions_categories ORDER BY category_order",
        )
        .fetch_all(&mut *tx)
        .await?;

        let questions = sqlx::query_as::<_, Question>(
            "SELECT q.id, q.category_id, c.name AS category_name, c.category_order, q.question, \
             q.question_description, q.question_order, q.option_yes, q.option_mid, q.option_no \
             FROM questions q JOIN questions_categories c ON c.id = q.category_id \
             ORDER BY c.category_order, q.question_order",
        )
        .fetch_all(&mut *tx)
        .await?;

        // catalog category id -> frozen category id
        let mut frozen_ids: HashMap<i64, i64> = HashMap::with_capacity(categories.len());
        for category in &categories {
            let frozen_id: i64 = sqlx::query_scalar(
                "INSERT INTO assessments_questions_categories (assessment_id, name, category_order) \
                 VALUES (?, ?, ?) RETURNING id",
            )
            .bind(&assessment_id)
            .bind(&category.name)
            .bind(category.category_order)
            .fetch_one(&mut *tx)
            .await?;
            frozen_ids.insert(category.id, frozen_id);

            sqlx::query(
                "INSERT INTO assessments_notes (assessment_id, category_order, note_content) \
                 VALUES (?, ?, NULL)",
            )
            .bind(&assessment_id)
            .bind(category.category_order)
            .execute(&mut *tx)
            .await?;
        }

        for question in &questions {
            let category_id = frozen_ids
                .get(&question.category_id)
                .copied()
                .ok_or(sqlx::Error::RowNotFound)?;

            let question_id: i64 = sqlx::query_scalar(
                "INSERT INTO assessments_questions (assessment_id, category_id, question, \
                 question_description, question_order, option_yes, option_mid, option_no) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(&assessment_id)
            .bind(category_id)
            .bind(&question.question)
            .bind(&question.question_description)
            .bind(question.question_order)
            .bind(&question.option_yes)
            .bind(&question.option_mid)
            .bind(&question.option_no)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO assessments_answers (id, assessment_id, question_id) VALUES (?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&assessment_id)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(assessment_id)
    }

    async fn get_assessment(&self, assessment_id: &str) -> Result<Assessment, sqlx::Error> {
        let sql = format!("{ASSESSMENT_SELECT} WHERE a.id = ?");
        sqlx::query_as::<_, Assessment>(&sql)
            .bind(assessment_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_assessments(&self) -> Result<Vec<Assessment>, sqlx::Error> {
        let sql = format!("{ASSESSMENT_SELECT} ORDER BY a.created_at DESC");
        sqlx::query_as::<_, Assessment>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_user_assessments(
        &self,
        owner_id: &str,
    ) -> Result<Vec<UserAssessment>, sqlx::Error> {
        let sql = "SELECT a.id, a.name, a.owner_id, o.username AS owner_name, \
             a.last_editor, e.username AS last_editor_name, a.last_edit, a.created_at, \
             EXISTS (SELECT 1 FROM reports r WHERE r.assessment_id = a.id AND r.is_public = 1) \
             AS has_reports \
             FROM assessments a \
             LEFT JOIN users o ON o.id = a.owner_id \
             LEFT JOIN users e ON e.id = a.last_editor \
             WHERE a.owner_id = ? ORDER BY a.created_at DESC";
        sqlx::query_as::<_, UserAssessment>(sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_assessment_categories(
        &self,
        assessment_id: &str,
    ) -> Result<Vec<AssessmentQuestionCategory>, sqlx::Error> {
        sqlx::query_as::<_, AssessmentQuestionCategory>(
            "SELECT id, assessment_id, name, category_order FROM assessments_questions_categories \
             WHERE assessment_id = ? ORDER BY category_order",
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_question_answer_rows(
        &self,
        assessment_id: &str,
    ) -> Result<Vec<AssessmentQA>, sqlx::Error> {
        let sql = format!(
            "{QA_SELECT} WHERE q.assessment_id = ? ORDER BY c.category_order, q.question_order"
        );
        sqlx::query_as::<_, AssessmentQA>(&sql)
            .bind(assessment_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_answer(&self, answer_id: &str) -> Result<Answer, sqlx::Error> {
        sqlx::query_as::<_, Answer>(
            "SELECT id, assessment_id, question_id, answer_option, answer_description \
             FROM assessments_answers WHERE id = ?",
        )
        .bind(answer_id)
        .fetch_one(&self.pool)
        .await
    }

    #[cfg(test)]
    async fn get_answer_count(&self, assessment_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM assessments_answers WHERE assessment_id = ?")
            .bind(assessment_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn save_answer(
        &self,
        answer_id: &str,
        answer_option: Option<AnswerOption>,
        answer_description: Option<&str>,
        editor_id: &str,
    ) -> Result<Answer, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let answer = sqlx::query_as::<_, Answer>(
            "UPDATE assessments_answers SET answer_option = ?, answer_description = ? \
             WHERE id = ? \
             RETURNING id, assessment_id, question_id, answer_option, answer_description",
        )
        .bind(answer_option)
        .bind(answer_description)
        .bind(answer_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE assessments SET last_editor = ?, last_edit = ? WHERE id = ?")
            .bind(editor_id)
            .bind(Utc::now())
            .bind(&answer.assessment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(answer)
    }

    async fn rename_assessment(
        &self,
        assessment_id: &str,
        name: &str,
    ) -> Result<Assessment, sqlx::Error> {
        let result = sqlx::query("UPDATE assessments SET name = ? WHERE id = ?")
            .bind(name)
            .bind(assessment_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        self.get_assessment(assessment_id).await
    }

    async fn change_assessment_owner(
        &self,
        assessment_id: &str,
        owner_id: &str,
    ) -> Result<Assessment, sqlx::Error> {
        let result = sqlx::query("UPDATE assessments SET owner_id = ? WHERE id = ?")
            .bind(owner_id)
            .bind(assessment_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        self.get_assessment(assessment_id).await
    }

    async fn delete_assessment(&self, assessment_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let wheel_filenames: Vec<String> =
            sqlx::query_scalar("SELECT wheel_filename FROM reports WHERE assessment_id = ?")
                .bind(assessment_id)
                .fetch_all(&mut *tx)
                .await?;

        // children before parents
        for table in [
            "reports",
            "assessments_answers",
            "assessments_notes",
            "assessments_questions",
            "assessments_questions_categories",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE assessment_id = ?"))
                .bind(assessment_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM assessments WHERE id = ?")
            .bind(assessment_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        tx.commit().await?;
        Ok(wheel_filenames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{QuestionExt, UserExt, question::tests::sample_catalog, tests::test_db};
    use crate::models::UserRole;
    use std::collections::HashSet;

    async fn seeded() -> (DBClient, String) {
        let db = test_db().await;
        db.replace_catalog(&sample_catalog()).await.unwrap();
        let owner = db
            .save_user("alice", "alice@example.com", "h", UserRole::User)
            .await
            .unwrap();
        (db, owner.id)
    }

    #[tokio::test]
    async fn freeze_copies_the_full_grid() {
        let (db, owner) = seeded().await;
        let id = db.create_assessment("Q1 Review", &owner).await.unwrap();

        let rows = db.get_question_answer_rows(&id).await.unwrap();
        assert_eq!(rows.len(), 52);
        let positions: HashSet<(i32, i32)> = rows
            .iter()
            .map(|r| (r.category_order, r.question_order))
            .collect();
        assert_eq!(positions.len(), 52);
        assert!(rows.iter().all(|r| r.answer_option.is_none()));
        assert_eq!(db.get_assessment_categories(&id).await.unwrap().len(), 13);
        assert_eq!(db.get_answer_count(&id).await.unwrap(), 52);

        let assessment = db.get_assessment(&id).await.unwrap();
        assert_eq!(assessment.owner_name.as_deref(), Some("alice"));
        assert!(assessment.last_edit.is_none());
    }

    #[tokio::test]
    async fn failed_freeze_leaves_no_rows() {
        let (db, owner) = seeded().await;
        sqlx::query(
            "CREATE TRIGGER fail_answer_insert AFTER INSERT ON assessments_answers \
             WHEN (SELECT COUNT(*) FROM assessments_answers) >= 30 \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        assert!(db.create_assessment("Broken", &owner).await.is_err());

        for table in [
            "assessments",
            "assessments_questions_categories",
            "assessments_questions",
            "assessments_answers",
            "assessments_notes",
        ] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&db.pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table}");
        }
        assert!(db.get_assessments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_answer_stamps_editor() {
        let (db, owner) = seeded().await;
        let id = db.create_assessment("A", &owner).await.unwrap();
        let rows = db.get_question_answer_rows(&id).await.unwrap();

        let answer = db
            .save_answer(&rows[0].answer_id, Some(AnswerOption::Yes), Some("done"), &owner)
            .await
            .unwrap();
        assert_eq!(answer.answer_option, Some(AnswerOption::Yes));

        let assessment = db.get_assessment(&id).await.unwrap();
        assert_eq!(assessment.last_editor.as_deref(), Some(owner.as_str()));
        assert!(assessment.last_edit.is_some());
        assert_eq!(db.get_answer_count(&id).await.unwrap(), 52);
    }

    #[tokio::test]
    async fn delete_removes_everything() {
        let (db, owner) = seeded().await;
        let id = db.create_assessment("A", &owner).await.unwrap();
        let filenames = db.delete_assessment(&id).await.unwrap();
        assert!(filenames.is_empty());
        assert!(matches!(
            db.get_assessment(&id).await,
            Err(sqlx::Error::RowNotFound)
        ));
        assert!(db.get_question_answer_rows(&id).await.unwrap().is_empty());
        assert!(matches!(
            db.delete_assessment(&id).await,
            Err(sqlx::Error::RowNotFound)
        ));
    }

    #[tokio::test]
    async fn owner_with_assessments_cannot_be_deleted() {
        let (db, owner) = seeded().await;
        db.create_assessment("A", &owner).await.unwrap();
        let err = db.delete_user(&owner).await.unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(ref e) if e.is_foreign_key_violation()));
    }
}
