//! User repository for database operations.

use crate::entities::{NewUser, User, UserUpdate};
use crate::types::{DatabaseError, DatabaseResult};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const USER_COLUMNS: &str =
    "id, username, password, email, phone, question, answer, role, created_at, updated_at";

/// Repository for account rows in the `users` table.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Count accounts with the given username.
    pub async fn count_by_username(&self, username: &str) -> DatabaseResult<i64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
                .bind(username)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(count.unwrap_or(0))
    }

    /// Count accounts with the given email.
    pub async fn count_by_email(&self, email: &str) -> DatabaseResult<i64> {
        let count: Option<i64> = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(count.unwrap_or(0))
    }

    /// Find the account matching the (username, password) pair exactly.
    pub async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? AND password = ?"
        ))
        .bind(username)
        .bind(password)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(row.map(|row| Self::row_to_user(&row)))
    }

    /// Insert a new account row, returning the number of affected rows.
    ///
    /// Uses `INSERT OR IGNORE` so a uniqueness race surfaces as zero affected
    /// rows rather than a query fault.
    pub async fn insert(&self, user: &NewUser) -> DatabaseResult<u64> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO users (username, password, email, phone, question, answer, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.question)
        .bind(&user.answer)
        .bind(user.role.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Fetch the stored security question for a username.
    pub async fn find_question_by_username(
        &self,
        username: &str,
    ) -> DatabaseResult<Option<String>> {
        let question: Option<Option<String>> =
            sqlx::query_scalar("SELECT question FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(question.flatten())
    }

    /// Count accounts matching the (username, question, answer) triple.
    pub async fn count_by_answer(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> DatabaseResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE username = ? AND question = ? AND answer = ?",
        )
        .bind(username)
        .bind(question)
        .bind(answer)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(count.unwrap_or(0))
    }

    /// Overwrite the password for a username, returning affected rows.
    pub async fn update_password_by_username(
        &self,
        username: &str,
        new_password: &str,
    ) -> DatabaseResult<u64> {
        let now = Utc::now().to_rfc3339();

        let result =
            sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE username = ?")
                .bind(new_password)
                .bind(&now)
                .bind(username)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Count accounts where the stored password matches for the given id.
    pub async fn count_by_password(
        &self,
        old_password: &str,
        user_id: i64,
    ) -> DatabaseResult<i64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE password = ? AND id = ?")
                .bind(old_password)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(count.unwrap_or(0))
    }

    /// Selective update: writes only the `Some` fields of the request.
    pub async fn update_selective(&self, update: &UserUpdate) -> DatabaseResult<u64> {
        let now = Utc::now().to_rfc3339();

        // Build dynamic update query based on provided fields
        let mut query_parts = Vec::new();
        let mut values = Vec::new();

        if let Some(ref password) = update.password {
            query_parts.push("password = ?");
            values.push(password.clone());
        }

        if let Some(ref email) = update.email {
            query_parts.push("email = ?");
            values.push(email.clone());
        }

        if let Some(ref phone) = update.phone {
            query_parts.push("phone = ?");
            values.push(phone.clone());
        }

        if let Some(ref question) = update.question {
            query_parts.push("question = ?");
            values.push(question.clone());
        }

        if let Some(ref answer) = update.answer {
            query_parts.push("answer = ?");
            values.push(answer.clone());
        }

        if query_parts.is_empty() {
            return Ok(0);
        }

        query_parts.push("updated_at = ?");
        values.push(now);

        let set_clause = query_parts.join(", ");
        let query_str = format!("UPDATE users SET {} WHERE id = ?", set_clause);

        let mut query = sqlx::query(&query_str);
        for value in values {
            query = query.bind(value);
        }
        query = query.bind(update.id);

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Find account by primary key.
    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(row.map(|row| Self::row_to_user(&row)))
    }

    /// Count accounts holding the email under a different primary key.
    pub async fn count_by_email_excluding_user(
        &self,
        email: &str,
        user_id: i64,
    ) -> DatabaseResult<i64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(count.unwrap_or(0))
    }

    fn row_to_user(row: &SqliteRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            password: row.get("password"),
            email: row.get("email"),
            phone: row.get("phone"),
            question: row.get("question"),
            answer: row.get("answer"),
            role: crate::entities::user::UserRole::from(row.get::<String, _>("role").as_str()),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
