//! Mock repository implementations for testing core service functionality

use chrono::Utc;
use emporia_database::{DatabaseResult, NewUser, User, UserUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory stand-in for the sqlx-backed user repository.
///
/// Mirrors the observable contract of the real repository, including the
/// zero-affected-rows result for duplicate inserts and empty selective
/// updates.
pub struct MockUserRepository {
    users: Arc<RwLock<HashMap<i64, User>>>,
    next_id: Arc<RwLock<i64>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(RwLock::new(1)),
        }
    }

    pub async fn count_by_username(&self, username: &str) -> DatabaseResult<i64> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| u.username == username).count() as i64)
    }

    pub async fn count_by_email(&self, email: &str) -> DatabaseResult<i64> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| u.email == email).count() as i64)
    }

    pub async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DatabaseResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.username == username && u.password == password)
            .cloned())
    }

    pub async fn insert(&self, user: &NewUser) -> DatabaseResult<u64> {
        let mut users = self.users.write().await;
        let duplicate = users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if duplicate {
            return Ok(0);
        }

        let mut next_id = self.next_id.write().await;
        let user_id = *next_id;
        *next_id += 1;

        let now = Utc::now().to_rfc3339();
        users.insert(
            user_id,
            User {
                id: user_id,
                username: user.username.clone(),
                password: user.password.clone(),
                email: user.email.clone(),
                phone: user.phone.clone(),
                question: user.question.clone(),
                answer: user.answer.clone(),
                role: user.role,
                created_at: now.clone(),
                updated_at: now,
            },
        );

        Ok(1)
    }

    pub async fn find_question_by_username(
        &self,
        username: &str,
    ) -> DatabaseResult<Option<String>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.username == username)
            .and_then(|u| u.question.clone()))
    }

    pub async fn count_by_answer(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> DatabaseResult<i64> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| {
                u.username == username
                    && u.question.as_deref() == Some(question)
                    && u.answer.as_deref() == Some(answer)
            })
            .count() as i64)
    }

    pub async fn update_password_by_username(
        &self,
        username: &str,
        new_password: &str,
    ) -> DatabaseResult<u64> {
        let mut users = self.users.write().await;
        if let Some(user) = users.values_mut().find(|u| u.username == username) {
            user.password = new_password.to_string();
            user.updated_at = Utc::now().to_rfc3339();
            Ok(1)
        } else {
            Ok(0)
        }
    }

    pub async fn count_by_password(
        &self,
        old_password: &str,
        user_id: i64,
    ) -> DatabaseResult<i64> {
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .filter(|u| u.password == old_password)
            .map(|_| 1)
            .unwrap_or(0))
    }

    pub async fn update_selective(&self, update: &UserUpdate) -> DatabaseResult<u64> {
        let has_fields = update.password.is_some()
            || update.email.is_some()
            || update.phone.is_some()
            || update.question.is_some()
            || update.answer.is_some();
        if !has_fields {
            return Ok(0);
        }

        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&update.id) else {
            return Ok(0);
        };

        if let Some(ref password) = update.password {
            user.password = password.clone();
        }
        if let Some(ref email) = update.email {
            user.email = email.clone();
        }
        if let Some(ref phone) = update.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(ref question) = update.question {
            user.question = Some(question.clone());
        }
        if let Some(ref answer) = update.answer {
            user.answer = Some(answer.clone());
        }
        user.updated_at = Utc::now().to_rfc3339();

        Ok(1)
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    pub async fn count_by_email_excluding_user(
        &self,
        email: &str,
        user_id: i64,
    ) -> DatabaseResult<i64> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.email == email && u.id != user_id)
            .count() as i64)
    }
}

impl Default for MockUserRepository {
    fn default() -> Self {
        Self::new()
    }
}
