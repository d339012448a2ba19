//! User account model.

use serde::{Deserialize, Serialize};

/// A stored user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Salted password digest, see [`crate::auth::hash_password`]
    pub password_hash: String,
    #[serde(rename = "_id", default)]
    pub id: String,
}

/// The part of a user that may leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub username: String,
    #[serde(rename = "_id")]
    pub id: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            id: user.id.clone(),
        }
    }
}

/// Request body for signup and login.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Both fields, when both are present and non-empty.
    pub fn into_parts(self) -> Option<(String, String)> {
        let username = self.username.filter(|u| !u.is_empty())?;
        let password = self.password.filter(|p| !p.is_empty())?;
        Some((username, password))
    }
}

/// Response body carrying an issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}
