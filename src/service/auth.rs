use crate::{
    db::{DBClient, UserExt},
    error::{ServiceError, TokenError},
    models::User,
    utils::{
        password,
        token::{self, ExpiryStatus},
    },
};

const WRONG_CREDENTIALS: &str = "Email or password is wrong";

/// Check credentials and issue an access token.
///
/// `identifier` is an e-mail address when it contains `@`, a username otherwise.
pub async fn login(
    db: &DBClient,
    identifier: &str,
    password_attempt: &str,
    secret: &[u8],
    maxage_seconds: i64,
) -> Result<(String, User), ServiceError> {
    let identifier = identifier.trim();
    let user = if identifier.contains('@') {
        db.get_user(None, None, Some(identifier), None).await?
    } else {
        db.get_user(None, Some(identifier), None, None).await?
    };
    let user = user.ok_or_else(|| ServiceError::invalid_input(WRONG_CREDENTIALS))?;

    let password_matched = password::compare(password_attempt, &user.password)
        .map_err(|_| ServiceError::invalid_input(WRONG_CREDENTIALS))?;
    if !password_matched {
        return Err(ServiceError::invalid_input(WRONG_CREDENTIALS));
    }

    let token = token::create_token(&user.id, secret, maxage_seconds)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    Ok((token, user))
}

/// Resolve the user behind a token. Tokens of deleted users are invalid.
pub async fn authenticate(
    db: &DBClient,
    access_token: &str,
    secret: &[u8],
) -> Result<User, ServiceError> {
    let user_id = token::decode_token(access_token, secret)?;
    db.get_user(Some(&user_id), None, None, None)
        .await?
        .ok_or(ServiceError::Token(TokenError::Invalid))
}

pub fn token_status(access_token: &str, secret: &[u8]) -> Result<ExpiryStatus, ServiceError> {
    Ok(token::expiry_status(access_token, secret)?)
}

/// Reissue the token of a user that still exists.
pub async fn renew(
    db: &DBClient,
    access_token: &str,
    secret: &[u8],
    maxage_seconds: i64,
) -> Result<String, ServiceError> {
    authenticate(db, access_token, secret).await?;
    Ok(token::renew_token(access_token, secret, maxage_seconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;
    use crate::models::UserRole;

    const SECRET: &[u8] = b"secret";

    async fn db_with_user() -> (DBClient, User) {
        let db = test_db().await;
        let hashed = password::hash("a long password!").unwrap();
        let user = db
            .save_user("alice", "alice@example.com", &hashed, UserRole::User)
            .await
            .unwrap();
        (db, user)
    }

    #[tokio::test]
    async fn login_by_email_or_username() {
        let (db, user) = db_with_user().await;
        let (token, by_email) = login(&db, "Alice@Example.com", "a long password!", SECRET, 900)
            .await
            .unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(authenticate(&db, &token, SECRET).await.unwrap().id, user.id);

        let (_, by_name) = login(&db, "alice", "a long password!", SECRET, 900).await.unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[tokio::test]
    async fn wrong_credentials_look_the_same() {
        let (db, _) = db_with_user().await;
        for (who, pw) in [
            ("alice", "not the password"),
            ("nobody", "a long password!"),
            ("alice", ""),
        ] {
            match login(&db, who, pw, SECRET, 900).await {
                Err(ServiceError::InvalidInput(message)) => assert_eq!(message, WRONG_CREDENTIALS),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn deleted_user_token_is_invalid() {
        let (db, user) = db_with_user().await;
        let token = token::create_token(&user.id, SECRET, 900).unwrap();
        db.delete_user(&user.id).await.unwrap();
        assert!(matches!(
            authenticate(&db, &token, SECRET).await,
            Err(ServiceError::Token(TokenError::Invalid))
        ));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (db, user) = db_with_user().await;
        let token = token::create_token(&user.id, SECRET, -10).unwrap();
        assert!(matches!(
            authenticate(&db, &token, SECRET).await,
            Err(ServiceError::Token(TokenError::Expired))
        ));
        assert!(matches!(
            token_status(&token, SECRET),
            Err(ServiceError::Token(TokenError::Expired))
        ));
    }

    #[tokio::test]
    async fn renew_of_short_token() {
        let (db, user) = db_with_user().await;
        let token = token::create_token(&user.id, SECRET, 60).unwrap();
        assert_eq!(
            token_status(&token, SECRET).unwrap(),
            ExpiryStatus::RenewalRecommended
        );
        let renewed = renew(&db, &token, SECRET, 900).await.unwrap();
        assert_eq!(token_status(&renewed, SECRET).unwrap(), ExpiryStatus::Ok);
    }

    #[tokio::test]
    async fn deleted_user_cannot_renew() {
        let (db, user) = db_with_user().await;
        let token = token::create_token(&user.id, SECRET, 900).unwrap();
        db.delete_user(&user.id).await.unwrap();
        assert!(matches!(
            renew(&db, &token, SECRET, 900).await,
            Err(ServiceError::Token(TokenError::Invalid))
        ));
    }
}
