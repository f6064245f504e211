use crate::{
    db::{DBClient, NoteExt},
    error::ServiceError,
    models::{Note, User},
    policy::{self, Capability},
};

pub async fn get(
    db: &DBClient,
    assessment_id: &str,
    category_order: i32,
    actor: &User,
) -> Result<Note, ServiceError> {
    policy::require(actor.role, Capability::ManageNotes)?;
    Ok(db.get_note(assessment_id, category_order).await?)
}

pub async fn get_by_id(db: &DBClient, note_id: i64, actor: &User) -> Result<Note, ServiceError> {
    policy::require(actor.role, Capability::ManageNotes)?;
    Ok(db.get_note_by_id(note_id).await?)
}

pub async fn list(
    db: &DBClient,
    assessment_id: &str,
    actor: &User,
) -> Result<Vec<Note>, ServiceError> {
    policy::require(actor.role, Capability::ManageNotes)?;
    Ok(db.get_notes(assessment_id).await?)
}

/// Replace a note. JSON `null` and a missing body both clear it; `{}` is kept.
pub async fn update(
    db: &DBClient,
    note_id: i64,
    content: Option<serde_json::Value>,
    actor: &User,
) -> Result<Note, ServiceError> {
    policy::require(actor.role, Capability::ManageNotes)?;
    let content = content.filter(|value| !value.is_null());
    Ok(db.update_note(note_id, content.as_ref()).await?)
}
