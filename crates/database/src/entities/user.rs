//! User entity definitions

use serde::{Deserialize, Serialize};

/// Account entity as persisted in the `users` table.
///
/// The `password` column stores the credential exactly as supplied by the
/// client. Values handed out by the service layer always have the password
/// blanked via [`User::scrub_password`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Blank the stored password before the entity crosses the service boundary.
    pub fn scrub_password(mut self) -> Self {
        self.password = String::new();
        self
    }
}

/// Payload for inserting a new account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub role: UserRole,
}

/// Selective update of an existing account row. Only `Some` fields are
/// written; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub id: i64,
    pub password: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
}

/// Account role enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Customer,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Admin => "admin",
        }
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::Customer,
        }
    }
}

impl ToString for UserRole {
    fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}
