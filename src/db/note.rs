use super::DBClient;
use crate::models::Note;

/// Note as stored: the JSON content is kept as text
#[derive(Debug, sqlx::FromRow)]
struct NoteRow {
    id: i64,
    assessment_id: String,
    category_order: i32,
    note_content: Option<String>,
}

impl TryFrom<NoteRow> for Note {
    type Error = sqlx::Error;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        let content = row
            .note_content
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Note {
            id: row.id,
            assessment_id: row.assessment_id,
            category_order: row.category_order,
            content,
        })
    }
}

pub trait NoteExt {
    async fn get_note(&self, assessment_id: &str, category_order: i32) -> Result<Note, sqlx::Error>;

    async fn get_note_by_id(&self, note_id: i64) -> Result<Note, sqlx::Error>;

    async fn get_notes(&self, assessment_id: &str) -> Result<Vec<Note>, sqlx::Error>;

    /// Replace the note content; `None` stores SQL NULL.
    async fn update_note(
        &self,
        note_id: i64,
        content: Option<&serde_json::Value>,
    ) -> Result<Note, sqlx::Error>;
}

impl NoteExt for DBClient {
    async fn get_note(
        &self,
        assessment_id: &str,
        category_order: i32,
    ) -> Result<Note, sqlx::Error> {
        sqlx::query_as::<_, NoteRow>(
            "SELECT id, assessment_id, category_order, note_content FROM assessments_notes \
             WHERE assessment_id = ? AND category_order = ?",
        )
        .bind(assessment_id)
        .bind(category_order)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn get_note_by_id(&self, note_id: i64) -> Result<Note, sqlx::Error> {
        sqlx::query_as::<_, NoteRow>(
            "SELECT id, assessment_id, category_order, note_content FROM assessments_notes \
             WHERE id = ?",
        )
        .bind(note_id)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn get_notes(&self, assessment_id: &str) -> Result<Vec<Note>, sqlx::Error> {
        sqlx::query_as::<_, NoteRow>(
            "SELECT id, assessment_id, category_order, note_content FROM assessments_notes \
             WHERE assessment_id = ? ORDER BY category_order",
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Note::try_from)
        .collect()
    }

    async fn update_note(
        &self,
        note_id: i64,
        content: Option<&serde_json::Value>,
    ) -> Result<Note, sqlx::Error> {
        let text = content.map(|value| value.to_string());
        sqlx::query_as::<_, NoteRow>(
            "UPDATE assessments_notes SET note_content = ? WHERE id = ? \
             RETURNING id, assessment_id, category_order, note_content",
        )
        .bind(text)
        .bind(note_id)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }
}
