//! Account service implementing the login, registration, recovery, and
//! profile flows.

use sqlx::sqlite::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use emporia_database::{
    DatabaseResult, NewUser, User, UserRepository, UserRole, UserUpdate,
};

use super::mock_repositories::MockUserRepository;
use crate::token_store::TokenStore;
use crate::types::{ProfileUpdate, RegisterRequest, ServiceResponse};

/// Stateless facade over the user repository and the recovery-token cache.
///
/// Every operation is single-shot: one to three sequential repository calls
/// plus branching validation, with the outcome reported through
/// [`ServiceResponse`]. Data-access faults propagate through the outer
/// `Result`.
pub struct AccountService<R> {
    user_repository: R,
    token_store: TokenStore,
}

impl AccountService<UserRepository> {
    /// Create a service instance backed by the real database repository.
    pub fn new(pool: SqlitePool, token_store: TokenStore) -> Self {
        Self {
            user_repository: UserRepository::new(pool),
            token_store,
        }
    }
}

impl AccountService<MockUserRepository> {
    /// Create a service instance for testing.
    pub fn new_for_testing() -> Self {
        Self {
            user_repository: MockUserRepository::new(),
            token_store: TokenStore::default(),
        }
    }
}

impl<R> AccountService<R>
where
    R: UserRepo,
{
    /// Authenticate a (username, password) pair.
    ///
    /// The returned user always has its password blanked.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> DatabaseResult<ServiceResponse<User>> {
        if self.user_repository.count_by_username(username).await? == 0 {
            return Ok(ServiceResponse::err_message("username not found"));
        }

        let Some(user) = self
            .user_repository
            .find_by_credentials(username, password)
            .await?
        else {
            return Ok(ServiceResponse::err_message("wrong password"));
        };

        info!(username, "user logged in");
        Ok(ServiceResponse::ok_with(
            "login successful",
            user.scrub_password(),
        ))
    }

    /// Register a new account. The customer role is force-assigned; the
    /// password is persisted exactly as supplied.
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> DatabaseResult<ServiceResponse<()>> {
        if self
            .user_repository
            .count_by_username(&request.username)
            .await?
            > 0
        {
            return Ok(ServiceResponse::err_message("username already exists"));
        }

        if self.user_repository.count_by_email(&request.email).await? > 0 {
            return Ok(ServiceResponse::err_message("email already exists"));
        }

        let user = NewUser {
            username: request.username,
            password: request.password,
            email: request.email,
            phone: request.phone,
            question: request.question,
            answer: request.answer,
            role: UserRole::Customer,
        };

        if self.user_repository.insert(&user).await? == 0 {
            return Ok(ServiceResponse::err_message("registration failed"));
        }

        info!(username = %user.username, "registered new account");
        Ok(ServiceResponse::ok_message("registration successful"))
    }

    /// Check whether a username or email is still available.
    ///
    /// `kind` selects the uniqueness constraint: `"username"` or `"email"`.
    /// A pre-existing match is reported as a failure; anything else for
    /// `kind` is rejected outright.
    pub async fn check_valid(&self, value: &str, kind: &str) -> DatabaseResult<ServiceResponse<()>> {
        match kind {
            "username" => {
                if self.user_repository.count_by_username(value).await? > 0 {
                    return Ok(ServiceResponse::err_message("username already exists"));
                }
            }
            "email" => {
                if self.user_repository.count_by_email(value).await? > 0 {
                    return Ok(ServiceResponse::err_message("email already exists"));
                }
            }
            _ => return Ok(ServiceResponse::err_message("invalid parameter")),
        }

        Ok(ServiceResponse::ok_message("validation passed"))
    }

    /// Fetch the security question for a username.
    pub async fn select_question(&self, username: &str) -> DatabaseResult<ServiceResponse<String>> {
        // check_valid succeeding means the username is still available, so
        // there is no such account.
        let valid = self.check_valid(username, "username").await?;
        if valid.is_success() {
            return Ok(ServiceResponse::err_message("user not found"));
        }

        match self
            .user_repository
            .find_question_by_username(username)
            .await?
        {
            Some(question) if !question.trim().is_empty() => {
                Ok(ServiceResponse::ok_payload(question))
            }
            _ => Ok(ServiceResponse::err_message("recovery question is empty")),
        }
    }

    /// Verify a security answer and hand out a recovery token on success.
    pub async fn check_question(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> DatabaseResult<ServiceResponse<String>> {
        if self
            .user_repository
            .count_by_answer(username, question, answer)
            .await?
            > 0
        {
            let forget_token = Uuid::new_v4().to_string();
            self.token_store.set(username, forget_token.clone()).await;
            return Ok(ServiceResponse::ok_payload(forget_token));
        }

        Ok(ServiceResponse::err_message("wrong answer"))
    }

    /// Reset a forgotten password, gated on the recovery token issued by
    /// [`check_question`](Self::check_question).
    pub async fn forget_reset_password(
        &self,
        username: &str,
        new_password: &str,
        forget_token: &str,
    ) -> DatabaseResult<ServiceResponse<()>> {
        if forget_token.trim().is_empty() {
            return Ok(ServiceResponse::err_message("token required"));
        }

        // Same availability check as select_question: success means the
        // account does not exist.
        let valid = self.check_valid(username, "username").await?;
        if valid.is_success() {
            return Ok(ServiceResponse::err_message("user not found"));
        }

        let Some(cached_token) = self.token_store.get(username).await else {
            return Ok(ServiceResponse::err_message("token invalid"));
        };

        if forget_token == cached_token {
            if self
                .user_repository
                .update_password_by_username(username, new_password)
                .await?
                > 0
            {
                warn!(username, "password reset via recovery token");
                return Ok(ServiceResponse::ok_message("password reset successful"));
            }
        } else {
            return Ok(ServiceResponse::err_message("token incorrect, retry"));
        }

        Ok(ServiceResponse::err_message("password reset failed"))
    }

    /// Change the password of a logged-in user.
    pub async fn reset_password(
        &self,
        old_password: &str,
        new_password: &str,
        user: &User,
    ) -> DatabaseResult<ServiceResponse<()>> {
        if self
            .user_repository
            .count_by_password(old_password, user.id)
            .await?
            == 0
        {
            return Ok(ServiceResponse::err_message("wrong old password"));
        }

        let update = UserUpdate {
            id: user.id,
            password: Some(new_password.to_string()),
            ..Default::default()
        };

        if self.user_repository.update_selective(&update).await? > 0 {
            warn!(username = %user.username, "password changed");
            return Ok(ServiceResponse::ok_message("password updated"));
        }

        Ok(ServiceResponse::err_message("password update failed"))
    }

    /// Update profile fields: email, phone, question, answer. Username and
    /// password are never touched through this path.
    pub async fn update_information(
        &self,
        request: ProfileUpdate,
    ) -> DatabaseResult<ServiceResponse<()>> {
        if self
            .user_repository
            .count_by_email_excluding_user(&request.email, request.id)
            .await?
            > 0
        {
            return Ok(ServiceResponse::err_message("email already exists"));
        }

        let update = UserUpdate {
            id: request.id,
            email: Some(request.email),
            phone: request.phone,
            question: request.question,
            answer: request.answer,
            password: None,
        };

        if self.user_repository.update_selective(&update).await? > 0 {
            return Ok(ServiceResponse::ok_message("profile updated"));
        }

        Ok(ServiceResponse::err_message("profile update failed"))
    }

    /// Look up an account by id, with the password blanked.
    ///
    /// A miss is reported as a message-only success, not a failure; callers
    /// historically rely on that channel.
    pub async fn get_information(&self, user_id: i64) -> DatabaseResult<ServiceResponse<User>> {
        match self.user_repository.find_by_id(user_id).await? {
            Some(user) => Ok(ServiceResponse::ok_payload(user.scrub_password())),
            None => Ok(ServiceResponse::ok_message("user not found")),
        }
    }

    /// Succeeds only for a present user whose role is admin.
    pub fn check_admin_role(&self, user: Option<&User>) -> ServiceResponse<()> {
        match user {
            Some(user) if user.role == UserRole::Admin => ServiceResponse::ok(),
            _ => ServiceResponse::err(),
        }
    }
}

/// Trait for user repositories to allow generic usage
pub trait UserRepo {
    async fn count_by_username(&self, username: &str) -> DatabaseResult<i64>;
    async fn count_by_email(&self, email: &str) -> DatabaseResult<i64>;
    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DatabaseResult<Option<User>>;
    async fn insert(&self, user: &NewUser) -> DatabaseResult<u64>;
    async fn find_question_by_username(&self, username: &str) -> DatabaseResult<Option<String>>;
    async fn count_by_answer(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> DatabaseResult<i64>;
    async fn update_password_by_username(
        &self,
        username: &str,
        new_password: &str,
    ) -> DatabaseResult<u64>;
    async fn count_by_password(&self, old_password: &str, user_id: i64) -> DatabaseResult<i64>;
    async fn update_selective(&self, update: &UserUpdate) -> DatabaseResult<u64>;
    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>>;
    async fn count_by_email_excluding_user(
        &self,
        email: &str,
        user_id: i64,
    ) -> DatabaseResult<i64>;
}

impl UserRepo for UserRepository {
    async fn count_by_username(&self, username: &str) -> DatabaseResult<i64> {
        self.count_by_username(username).await
    }

    async fn count_by_email(&self, email: &str) -> DatabaseResult<i64> {
        self.count_by_email(email).await
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DatabaseResult<Option<User>> {
        self.find_by_credentials(username, password).await
    }

    async fn insert(&self, user: &NewUser) -> DatabaseResult<u64> {
        self.insert(user).await
    }

    async fn find_question_by_username(&self, username: &str) -> DatabaseResult<Option<String>> {
        self.find_question_by_username(username).await
    }

    async fn count_by_answer(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> DatabaseResult<i64> {
        self.count_by_answer(username, question, answer).await
    }

    async fn update_password_by_username(
        &self,
        username: &str,
        new_password: &str,
    ) -> DatabaseResult<u64> {
        self.update_password_by_username(username, new_password).await
    }

    async fn count_by_password(&self, old_password: &str, user_id: i64) -> DatabaseResult<i64> {
        self.count_by_password(old_password, user_id).await
    }

    async fn update_selective(&self, update: &UserUpdate) -> DatabaseResult<u64> {
        self.update_selective(update).await
    }

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        self.find_by_id(id).await
    }

    async fn count_by_email_excluding_user(
        &self,
        email: &str,
        user_id: i64,
    ) -> DatabaseResult<i64> {
        self.count_by_email_excluding_user(email, user_id).await
    }
}

impl UserRepo for MockUserRepository {
    async fn count_by_username(&self, username: &str) -> DatabaseResult<i64> {
        self.count_by_username(username).await
    }

    async fn count_by_email(&self, email: &str) -> DatabaseResult<i64> {
        self.count_by_email(email).await
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> DatabaseResult<Option<User>> {
        self.find_by_credentials(username, password).await
    }

    async fn insert(&self, user: &NewUser) -> DatabaseResult<u64> {
        self.insert(user).await
    }

    async fn find_question_by_username(&self, username: &str) -> DatabaseResult<Option<String>> {
        self.find_question_by_username(username).await
    }

    async fn count_by_answer(
        &self,
        username: &str,
        question: &str,
        answer: &str,
    ) -> DatabaseResult<i64> {
        self.count_by_answer(username, question, answer).await
    }

    async fn update_password_by_username(
        &self,
        username: &str,
        new_password: &str,
    ) -> DatabaseResult<u64> {
        self.update_password_by_username(username, new_password).await
    }

    async fn count_by_password(&self, old_password: &str, user_id: i64) -> DatabaseResult<i64> {
        self.count_by_password(old_password, user_id).await
    }

    async fn update_selective(&self, update: &UserUpdate) -> DatabaseResult<u64> {
        self.update_selective(update).await
    }

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        self.find_by_id(id).await
    }

    async fn count_by_email_excluding_user(
        &self,
        email: &str,
        user_id: i64,
    ) -> DatabaseResult<i64> {
        self.count_by_email_excluding_user(email, user_id).await
    }
}
