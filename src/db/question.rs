use super::DBClient;
use crate::models::{Question, QuestionCategory};
use serde::Deserialize;

const QUESTION_SELECT: &str = "SELECT q.id, q.category_id, c.name AS category_name, \
    c.category_order, q.question, q.question_description, q.question_order, \
    q.option_yes, q.option_mid, q.option_no \
    FROM questions q JOIN questions_categories c ON c.id = q.category_id";

/// Catalog category as loaded from the bundled defaults
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub question: String,
    #[serde(default)]
    pub question_description: String,
    pub option_yes: String,
    pub option_mid: String,
    pub option_no: String,
}

pub trait QuestionExt {
    async fn get_categories(&self) -> Result<Vec<QuestionCategory>, sqlx::Error>;

    async fn get_category(&self, category_id: i64) -> Result<QuestionCategory, sqlx::Error>;

    /// Whole catalog ordered by (category_order, question_order)
    async fn get_questions(&self) -> Result<Vec<Question>, sqlx::Error>;

    async fn get_category_questions(&self, category_id: i64) -> Result<Vec<Question>, sqlx::Error>;

    async fn get_question(&self, question_id: i64) -> Result<Question, sqlx::Error>;

    async fn get_category_count(&self) -> Result<i64, sqlx::Error>;

    /// Delete every catalog row and insert `categories` in order (orders 0.., 1..).
    async fn replace_catalog(&self, categories: &[NewCategory]) -> Result<(), sqlx::Error>;

    async fn rename_category(
        &self,
        category_id: i64,
        name: &str,
    ) -> Result<QuestionCategory, sqlx::Error>;

    /// Move a category to `new_order`, swapping with the category already there.
    async fn move_category(
        &self,
        category_id: i64,
        new_order: i32,
    ) -> Result<QuestionCategory, sqlx::Error>;

    async fn update_question(
        &self,
        question_id: i64,
        question: &str,
        question_description: &str,
        option_yes: &str,
        option_mid: &str,
        option_no: &str,
    ) -> Result<Question, sqlx::Error>;
}

impl QuestionExt for DBClient {
    async fn get_categories(&self) -> Result<Vec<QuestionCategory>, sqlx::Error> {
        sqlx::query_as::<_, QuestionCategory>(
            "SELECT id, name, category_order FROM questions_categories ORDER BY category_order",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_category(&self, category_id: i64) -> Result<QuestionCategory, sqlx::Error> {
        sqlx::query_as::<_, QuestionCategory>(
            "SELECT id, name, category_order FROM questions_categories WHERE id = ?",
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_questions(&self) -> Result<Vec<Question>, sqlx::Error> {
        let sql = format!("{QUESTION_SELECT} ORDER BY c.category_order, q.question_order");
        sqlx::query_as::<_, Question>(&sql).fetch_all(&self.pool).await
    }

    async fn get_category_questions(&self, category_id: i64) -> Result<Vec<Question>, sqlx::Error> {
        let sql = format!("{QUESTION_SELECT} WHERE q.category_id = ? ORDER BY q.question_order");
        sqlx::query_as::<_, Question>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_question(&self, question_id: i64) -> Result<Question, sqlx::Error> {
        let sql = format!("{QUESTION_SELECT} WHERE q.id = ?");
        sqlx::query_as::<_, Question>(&sql)
            .bind(question_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_category_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM questions_categories")
            .fetch_one(&self.pool)
            .await
    }

    async fn replace_catalog(&self, categories: &[NewCategory]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM questions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM questions_categories")
            .execute(&mut *tx)
            .await?;

        for (category_order, category) in categories.iter().enumerate() {
            let category_id: i64 = sqlx::query_scalar(
                "INSERT INTO questions_categories (name, category_order) VALUES (?, ?) RETURNING id",
            )
            .bind(&category.name)
            .bind(category_order as i32)
            .fetch_one(&mut *tx)
            .await?;

            for (index, question) in category.questions.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO questions (category_id, question, question_description, \
                     question_order, option_yes, option_mid, option_no) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(category_id)
                .bind(&question.question)
                .bind(&question.question_description)
                .bind(index as i32 + 1)
                .bind(&question.option_yes)
                .bind(&question.option_mid)
                .bind(&question.option_no)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await
    }

    async fn rename_category(
        &self,
        category_id: i64,
        name: &str,
    ) -> Result<QuestionCategory, sqlx::Error> {
        sqlx::query_as::<_, QuestionCategory>(
            "UPDATE questions_categories SET name = ? WHERE id = ? \
             RETURNING id, name, category_order",
        )
        .bind(name)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn move_category(
        &self,
        category_id: i64,
        new_order: i32,
    ) -> Result<QuestionCategory, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let current: i32 =
            sqlx::query_scalar("SELECT category_order FROM questions_categories WHERE id = ?")
                .bind(category_id)
                .fetch_one(&mut *tx)
                .await?;

        if current != new_order {
            let occupant: Option<i64> =
                sqlx::query_scalar("SELECT id FROM questions_categories WHERE category_order = ?")
                    .bind(new_order)
                    .fetch_optional(&mut *tx)
                    .await?;

            // category_order is UNIQUE and checked per row, park the occupant first
            if let Some(occupant) = occupant {
                sqlx::query("UPDATE questions_categories SET category_order = -1 WHERE id = ?")
                    .bind(occupant)
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query("UPDATE questions_categories SET category_order = ? WHERE id = ?")
                .bind(new_order)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;

            if let Some(occupant) = occupant {
                sqlx::query("UPDATE questions_categories SET category_order = ? WHERE id = ?")
                    .bind(current)
                    .bind(occupant)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let category = sqlx::query_as::<_, QuestionCategory>(
            "SELECT id, name, category_order FROM questions_categories WHERE id = ?",
        )
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(category)
    }

    async fn update_question(
        &self,
        question_id: i64,
        question: &str,
        question_description: &str,
        option_yes: &str,
        option_mid: &str,
        option_no: &str,
    ) -> Result<Question, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE questions SET question = ?, question_description = ?, \
             option_yes = ?, option_mid = ?, option_no = ? WHERE id = ?",
        )
        .bind(question)
        .bind(question_description)
        .bind(option_yes)
        .bind(option_mid)
        .bind(option_no)
        .bind(question_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        self.get_question(question_id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::tests::test_db;

    /// Small synthetic catalog with the full 13x4 shape
    pub(crate) fn sample_catalog() -> Vec<NewCategory> {
        (0..13)
            .map(|c| NewCategory {
                name: format!("Category {c}"),
                questions: (1..=4)
                    .map(|q| NewQuestion {
                        question: format!("Question {c}.{q}"),
                        question_description: String::new(),
                        option_yes: "yes".into(),
                        option_mid: "mid".into(),
                        option_no: "no".into(),
                    })
                    .collect(),
            })
            .collect()
    }

    #[tokio::test]
    async fn replace_catalog_is_repeatable() {
        let db = test_db().await;
        db.replace_catalog(&sample_catalog()).await.unwrap();
        db.replace_catalog(&sample_catalog()).await.unwrap();

        let categories = db.get_categories().await.unwrap();
        let questions = db.get_questions().await.unwrap();
        assert_eq!(categories.len(), 13);
        assert_eq!(questions.len(), 52);
        assert_eq!(categories[0].category_order, 0);
        assert_eq!(questions[51].category_order, 12);
        assert_eq!(questions[51].question_order, 4);
    }

    #[tokio::test]
    async fn move_category_swaps_orders() {
        let db = test_db().await;
        db.replace_catalog(&sample_catalog()).await.unwrap();
        let categories = db.get_categories().await.unwrap();
        let first = categories[0].id;
        let fifth = categories[4].id;

        let moved = db.move_category(first, 4).await.unwrap();
        assert_eq!(moved.category_order, 4);
        assert_eq!(db.get_category(fifth).await.unwrap().category_order, 0);

        let orders: Vec<i32> = db
            .get_categories()
            .await
            .unwrap()
            .iter()
            .map(|c| c.category_order)
            .collect();
        assert_eq!(orders, (0..13).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn update_missing_question_is_row_not_found() {
        let db = test_db().await;
        assert!(matches!(
            db.update_question(999, "q", "", "y", "m", "n").await,
            Err(sqlx::Error::RowNotFound)
        ));
    }
}
