//! Request payloads accepted by the account service.

use serde::{Deserialize, Serialize};

/// Registration payload. The service force-assigns the customer role; the
/// password is persisted exactly as supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
}

/// Profile update payload. Only email, phone, question, and answer can be
/// changed through this path; username and password are never touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub id: i64,
    pub email: String,
    pub phone: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
}
