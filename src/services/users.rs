use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::Store,
    error::AppResult,
    models::{NewUser, User},
};

/// Registers a user with default preferences
pub async fn register(store: &dyn Store, new_user: NewUser, now: DateTime<Utc>) -> AppResult<User> {
    let user = new_user.validate()?.into_user(now);
    let user = store.create_user(user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    Ok(user)
}

pub async fn current(store: &dyn Store, user_id: Uuid) -> AppResult<User> {
    store.find_user(user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::AppError;
    use crate::models::UserPreferences;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: None,
            last_name: None,
            avatar: None,
        }
    }

    #[tokio::test]
    async fn test_register_starts_with_default_preferences() {
        let store = MemoryStore::new();
        let user = register(&store, new_user(" Ana@Example.com ", "ana"), Utc::now())
            .await
            .unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert_eq!(current(&store, user.id).await.unwrap(), user);
        assert_eq!(
            store.load_preferences(user.id).await.unwrap(),
            UserPreferences::new()
        );
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let store = MemoryStore::new();
        register(&store, new_user("ana@example.com", "ana"), Utc::now())
            .await
            .unwrap();

        let same_email = register(&store, new_user("ANA@example.com", "other"), Utc::now()).await;
        assert!(matches!(same_email, Err(AppError::Conflict(_))));

        let same_username = register(&store, new_user("b@example.com", "ana"), Utc::now()).await;
        assert!(matches!(same_username, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_payload() {
        let store = MemoryStore::new();
        let result = register(&store, new_user("not-an-email", "ana"), Utc::now()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_current_unknown_user() {
        let store = MemoryStore::new();
        assert!(matches!(
            current(&store, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
