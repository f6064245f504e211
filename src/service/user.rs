use chrono::{Duration, Utc};

use crate::{
    db::{DBClient, UserExt},
    error::ServiceError,
    mail::{
        Mailer,
        mails::{send_forgot_password_email, send_welcome_email},
    },
    models::{User, UserRole},
    policy,
    service::hide_missing,
    utils::{password, random::url_safe_token},
};

/// Reset links stay valid this long
pub const RESET_TOKEN_VALIDITY_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct CreatedUser {
    pub user: User,
    pub mail_warning: Option<String>,
}

fn forbidden() -> ServiceError {
    ServiceError::unauthorized("You are not allowed to perform this action.")
}

/// Create a user and send the welcome mail. A failed mail does not undo the user.
pub async fn create(
    db: &DBClient,
    mailer: &Mailer,
    frontend_url: &str,
    new_user: &NewUser,
    actor: &User,
) -> Result<CreatedUser, ServiceError> {
    if !policy::can_create_user(actor.role, new_user.role) {
        return Err(forbidden());
    }

    let hashed_password = password::hash(&new_user.password)?;
    let email = new_user.email.trim().to_lowercase();
    let user = db
        .save_user(new_user.username.trim(), &email, &hashed_password, new_user.role)
        .await?;
    tracing::info!(user_id = %user.id, role = user.role.to_str(), "User created");

    let mail_warning = send_welcome_email(mailer, &user.email, &user.username, frontend_url)
        .await
        .err()
        .map(|e| {
            tracing::warn!(user_id = %user.id, "Welcome mail not sent: {}", e);
            e.to_string()
        });

    Ok(CreatedUser { user, mail_warning })
}

pub async fn list(db: &DBClient, actor: &User) -> Result<Vec<User>, ServiceError> {
    if !policy::is_manager(actor.role) {
        return Err(forbidden());
    }
    Ok(db.get_users().await?)
}

/// Load a user the actor may see: themselves, or anyone for managers.
pub async fn get(db: &DBClient, user_id: &str, actor: &User) -> Result<User, ServiceError> {
    let is_manager = policy::is_manager(actor.role);
    if !is_manager && user_id != actor.id {
        return Err(forbidden());
    }
    db.get_user(Some(user_id), None, None, None)
        .await?
        .ok_or_else(|| hide_missing(sqlx::Error::RowNotFound, is_manager))
}

pub async fn update(
    db: &DBClient,
    user_id: &str,
    payload: &UserUpdate,
    actor: &User,
) -> Result<User, ServiceError> {
    if payload.id != user_id {
        return Err(ServiceError::data_mismatch(
            "User id in the path does not match the payload.",
        ));
    }

    let target = get(db, user_id, actor).await?;
    if !policy::can_modify_user(&actor.id, actor.role, &target.id, target.role) {
        return Err(forbidden());
    }
    if payload.role != target.role && !policy::can_grant_role(actor.role, payload.role) {
        return Err(forbidden());
    }

    let hashed_password = match &payload.password {
        Some(new_password) if !new_password.is_empty() => Some(password::hash(new_password)?),
        _ => None,
    };

    let email = payload.email.trim().to_lowercase();
    let user = db
        .update_user(
            user_id,
            payload.username.trim(),
            &email,
            payload.role,
            hashed_password.as_deref(),
        )
        .await?;
    tracing::info!(user_id, "User updated");
    Ok(user)
}

pub async fn delete(db: &DBClient, user_id: &str, actor: &User) -> Result<User, ServiceError> {
    let target = get(db, user_id, actor).await?;
    if !policy::can_delete_user(actor.role, target.role) {
        return Err(forbidden());
    }
    db.delete_user(user_id).await?;
    tracing::info!(user_id, "User deleted");
    Ok(target)
}

/// Start a password reset. Unknown addresses get the same answer as known ones.
pub async fn request_password_reset(
    db: &DBClient,
    mailer: &Mailer,
    frontend_url: &str,
    email: &str,
) -> Result<(), ServiceError> {
    let Some(user) = db.get_user(None, None, Some(email.trim()), None).await? else {
        tracing::info!("Password reset requested for unknown e-mail");
        return Ok(());
    };

    let token = url_safe_token();
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_VALIDITY_MINUTES);
    db.set_reset_token(&user.id, &token, expires_at).await?;

    if let Err(e) =
        send_forgot_password_email(mailer, &user.email, &user.username, &token, frontend_url).await
    {
        tracing::warn!(user_id = %user.id, "Password reset mail not sent: {}", e);
    }
    Ok(())
}

pub async fn set_password_with_token(
    db: &DBClient,
    token: &str,
    new_password: &str,
) -> Result<User, ServiceError> {
    let invalid = || ServiceError::invalid_input("Reset link is invalid or has expired.");

    let user = db
        .get_user(None, None, None, Some(token))
        .await?
        .ok_or_else(invalid)?;
    let still_valid = user
        .reset_token_expires_at
        .is_some_and(|expires_at| expires_at > Utc::now());
    if !still_valid {
        return Err(invalid());
    }

    let hashed_password = password::hash(new_password)?;
    let user = db.update_user_password(&user.id, &hashed_password).await?;
    tracing::info!(user_id = %user.id, "Password set through reset link");
    Ok(user)
}

/// Seed the configured admin when the user table is empty.
pub async fn ensure_default_admin(
    db: &DBClient,
    username: &str,
    email: &str,
    default_password: &str,
) -> Result<Option<User>, ServiceError> {
    if db.get_user_count().await? > 0 {
        return Ok(None);
    }
    let hashed_password = password::hash(default_password)?;
    let user = db
        .save_user(username, &email.trim().to_lowercase(), &hashed_password, UserRole::Admin)
        .await?;
    tracing::info!(username, "Default admin created");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;
    use crate::service::{assessment, fixtures::world};

    fn new_user(username: &str, email: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password: "a perfectly fine password".into(),
            role,
        }
    }

    #[tokio::test]
    async fn create_lowercases_email_and_warns_without_smtp() {
        let w = world().await;
        let created = create(
            &w.db,
            &Mailer::default(),
            "http://localhost",
            &new_user("carol", "Carol@Example.COM", UserRole::User),
            &w.coach,
        )
        .await
        .unwrap();
        assert_eq!(created.user.email, "carol@example.com");
        assert!(created.mail_warning.is_some());
        assert!(password::compare("a perfectly fine password", &created.user.password).unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_not_unique() {
        let w = world().await;
        let result = create(
            &w.db,
            &Mailer::default(),
            "",
            &new_user("alice2", "ALICE@example.com", UserRole::User),
            &w.admin,
        )
        .await;
        assert!(matches!(result, Err(ServiceError::NotUnique(_))));

        let result = create(
            &w.db,
            &Mailer::default(),
            "",
            &new_user("alice", "other@example.com", UserRole::User),
            &w.admin,
        )
        .await;
        assert!(matches!(result, Err(ServiceError::NotUnique(_))));
    }

    #[tokio::test]
    async fn create_respects_policy_and_password_rules() {
        let w = world().await;
        let mailer = Mailer::default();
        let admin = new_user("x", "x@example.com", UserRole::Admin);
        assert!(matches!(
            create(&w.db, &mailer, "", &admin, &w.coach).await,
            Err(ServiceError::Unauthorized(_))
        ));
        let plain = new_user("x", "x@example.com", UserRole::User);
        assert!(matches!(
            create(&w.db, &mailer, "", &plain, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));

        let mut short = new_user("x", "x@example.com", UserRole::User);
        short.password = "short".into();
        assert!(matches!(
            create(&w.db, &mailer, "", &short, &w.admin).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert_eq!(list(&w.db, &w.admin).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn users_see_only_themselves() {
        let w = world().await;
        assert_eq!(get(&w.db, &w.alice.id, &w.alice).await.unwrap().id, w.alice.id);
        assert!(matches!(
            get(&w.db, &w.bob.id, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            get(&w.db, "ghost", &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            get(&w.db, "ghost", &w.admin).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            list(&w.db, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn update_rules() {
        let w = world().await;
        let mut payload = UserUpdate {
            id: w.alice.id.clone(),
            username: "alice".into(),
            email: "Alice.New@example.com".into(),
            role: UserRole::User,
            password: None,
        };

        assert!(matches!(
            update(&w.db, &w.bob.id, &payload, &w.alice).await,
            Err(ServiceError::DataMismatch(_))
        ));

        let updated = update(&w.db, &w.alice.id, &payload, &w.alice).await.unwrap();
        assert_eq!(updated.email, "alice.new@example.com");
        assert_eq!(updated.password, w.alice.password);

        payload.role = UserRole::Coach;
        assert!(matches!(
            update(&w.db, &w.alice.id, &payload, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));

        let promoted = update(&w.db, &w.alice.id, &payload, &w.coach).await.unwrap();
        assert_eq!(promoted.role, UserRole::Coach);

        let admin_payload = UserUpdate {
            id: w.admin.id.clone(),
            username: "admin".into(),
            email: "admin@example.com".into(),
            role: UserRole::User,
            password: None,
        };
        assert!(matches!(
            update(&w.db, &w.admin.id, &admin_payload, &w.coach).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn delete_rules() {
        let w = world().await;
        assert!(matches!(
            delete(&w.db, &w.admin.id, &w.coach).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            delete(&w.db, &w.bob.id, &w.alice).await,
            Err(ServiceError::Unauthorized(_))
        ));

        assessment::create(&w.db, "A", &w.alice.id, &w.admin).await.unwrap();
        assert!(matches!(
            delete(&w.db, &w.alice.id, &w.admin).await,
            Err(ServiceError::Integrity(_))
        ));

        delete(&w.db, &w.bob.id, &w.coach).await.unwrap();
        assert!(matches!(
            get(&w.db, &w.bob.id, &w.admin).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn password_reset_round() {
        let w = world().await;
        let mailer = Mailer::default();

        request_password_reset(&w.db, &mailer, "http://localhost", "nobody@example.com")
            .await
            .unwrap();
        request_password_reset(&w.db, &mailer, "http://localhost", "ALICE@example.com")
            .await
            .unwrap();

        let token = w
            .db
            .get_user(Some(&w.alice.id), None, None, None)
            .await
            .unwrap()
            .unwrap()
            .reset_token
            .unwrap();

        assert!(matches!(
            set_password_with_token(&w.db, "wrong", "a brand new password").await,
            Err(ServiceError::InvalidInput(_))
        ));
        let user = set_password_with_token(&w.db, &token, "a brand new password")
            .await
            .unwrap();
        assert!(user.reset_token.is_none());
        assert!(password::compare("a brand new password", &user.password).unwrap());

        // tokens are single use
        assert!(set_password_with_token(&w.db, &token, "another new password").await.is_err());
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let w = world().await;
        w.db
            .set_reset_token(&w.bob.id, "old", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();
        assert!(matches!(
            set_password_with_token(&w.db, "old", "a brand new password").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn default_admin_only_on_empty_table() {
        let db = test_db().await;
        let admin = ensure_default_admin(&db, "root", "Root@Example.com", "initial password")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(admin.email, "root@example.com");
        assert!(
            ensure_default_admin(&db, "root2", "r2@example.com", "initial password")
                .await
                .unwrap()
                .is_none()
        );
    }
}
