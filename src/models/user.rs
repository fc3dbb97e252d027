use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 30;

/// A registered account. Credentials live with the identity provider, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NewUser {
    /// Normalizes the payload and checks it, returning the cleaned copy
    pub fn validate(self) -> AppResult<Self> {
        let email = self.email.trim().to_lowercase();
        let valid_email = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
            .unwrap_or(false);
        if !valid_email {
            return Err(AppError::InvalidInput(format!("Invalid email: {}", self.email)));
        }

        let username = self.username.trim().to_string();
        let len = username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(AppError::InvalidInput(format!(
                "Username must be between {} and {} characters",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            )));
        }

        Ok(Self {
            email,
            username,
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            avatar: trimmed(self.avatar),
        })
    }

    pub fn into_user(self, created_at: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar: self.avatar,
            created_at,
        }
    }
}
