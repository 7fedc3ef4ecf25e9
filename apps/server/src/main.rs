use std::{
    collections::HashMap, sync::Arc, time::Duration as StdDuration, time::Instant,
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use emporia_accounts::{
    AccountService, DatabaseError, ProfileUpdate, RegisterRequest, ServiceResponse, TokenStore,
    User, UserRepository,
};
use emporia_config::load as load_config;
use emporia_database::initialize_database;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, signal, sync::Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("starting Emporia backend");

    let config = load_config().context("failed to load configuration")?;

    let db_pool = initialize_database(&config.database)
        .await
        .context("failed to initialise database")?;

    let token_store = TokenStore::new(StdDuration::from_secs(
        config.auth.recovery_token_ttl_seconds,
    ));
    let state = AppState {
        accounts: Arc::new(AccountService::new(db_pool, token_store)),
        sessions: SessionStore::new(StdDuration::from_secs(config.auth.session_ttl_seconds)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = build_router(state).layer(cors);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/user/login", post(login))
        .route("/api/user/register", post(register))
        .route("/api/user/check_valid", get(check_valid))
        .route("/api/user/question", get(select_question))
        .route("/api/user/check_answer", post(check_answer))
        .route("/api/user/forget_reset_password", post(forget_reset_password))
        .route("/api/user/reset_password", post(reset_password))
        .route("/api/user/update_information", post(update_information))
        .route("/api/user/information", get(get_information))
        .route("/api/user/check_admin", get(check_admin))
        .route("/api/user/logout", get(logout))
        .with_state(state)
}

#[derive(Clone)]
struct AppState {
    accounts: Arc<AccountService<UserRepository>>,
    sessions: SessionStore,
}

impl AppState {
    /// Resolve the bearer token to the logged-in user.
    async fn current_user(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let token = require_bearer(headers)?;
        let user_id = self
            .sessions
            .lookup(&token)
            .await
            .ok_or_else(|| ApiError::unauthorized("invalid or expired session"))?;

        let response = self.accounts.get_information(user_id).await?;
        response
            .into_payload()
            .ok_or_else(|| ApiError::unauthorized("invalid or expired session"))
    }
}

/// In-memory bearer-token session map with TTL pruning.
#[derive(Clone)]
struct SessionStore {
    inner: Arc<Mutex<HashMap<String, (i64, Instant)>>>,
    ttl: StdDuration,
}

impl SessionStore {
    fn new(ttl: StdDuration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    async fn issue(&self, user_id: i64) -> String {
        let token = Self::random_token();
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        guard.insert(token.clone(), (user_id, Instant::now()));
        token
    }

    async fn lookup(&self, token: &str) -> Option<i64> {
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        guard.get(token).map(|(user_id, _)| *user_id)
    }

    async fn revoke(&self, token: &str) -> bool {
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        guard.remove(token).is_some()
    }

    fn random_token() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    fn prune(map: &mut HashMap<String, (i64, Instant)>, ttl: StdDuration) {
        let now = Instant::now();
        map.retain(|_, (_, created)| now.duration_since(*created) <= ttl);
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginData {
    token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct CheckValidQuery {
    value: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct QuestionQuery {
    username: String,
}

#[derive(Debug, Deserialize)]
struct CheckAnswerRequest {
    username: String,
    question: String,
    answer: String,
}

#[derive(Debug, Deserialize)]
struct ForgetResetRequest {
    username: String,
    new_password: String,
    forget_token: String,
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct UpdateInformationRequest {
    email: String,
    phone: Option<String>,
    question: Option<String>,
    answer: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(value: DatabaseError) -> Self {
        error!(error = ?value, "database error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, value.to_string())
    }
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ServiceResponse<LoginData>>, ApiError> {
    let response = state
        .accounts
        .login(&payload.username, &payload.password)
        .await?;

    // A successful login also opens a session; business failures pass
    // through in the body unchanged.
    let response = match response {
        ServiceResponse::Success {
            message,
            payload: Some(user),
        } => {
            let token = state.sessions.issue(user.id).await;
            ServiceResponse::Success {
                message,
                payload: Some(LoginData { token, user }),
            }
        }
        ServiceResponse::Success {
            message,
            payload: None,
        } => ServiceResponse::Success {
            message,
            payload: None,
        },
        ServiceResponse::Failure { message } => ServiceResponse::Failure { message },
    };

    Ok(Json(response))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ServiceResponse<()>>, ApiError> {
    let response = state.accounts.register(payload).await?;
    Ok(Json(response))
}

async fn check_valid(
    State(state): State<AppState>,
    Query(params): Query<CheckValidQuery>,
) -> Result<Json<ServiceResponse<()>>, ApiError> {
    let response = state.accounts.check_valid(&params.value, &params.kind).await?;
    Ok(Json(response))
}

async fn select_question(
    State(state): State<AppState>,
    Query(params): Query<QuestionQuery>,
) -> Result<Json<ServiceResponse<String>>, ApiError> {
    let response = state.accounts.select_question(&params.username).await?;
    Ok(Json(response))
}

async fn check_answer(
    State(state): State<AppState>,
    Json(payload): Json<CheckAnswerRequest>,
) -> Result<Json<ServiceResponse<String>>, ApiError> {
    let response = state
        .accounts
        .check_question(&payload.username, &payload.question, &payload.answer)
        .await?;
    Ok(Json(response))
}

async fn forget_reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgetResetRequest>,
) -> Result<Json<ServiceResponse<()>>, ApiError> {
    let response = state
        .accounts
        .forget_reset_password(
            &payload.username,
            &payload.new_password,
            &payload.forget_token,
        )
        .await?;
    Ok(Json(response))
}

async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ServiceResponse<()>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let response = state
        .accounts
        .reset_password(&payload.old_password, &payload.new_password, &user)
        .await?;
    Ok(Json(response))
}

async fn update_information(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateInformationRequest>,
) -> Result<Json<ServiceResponse<()>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let response = state
        .accounts
        .update_information(ProfileUpdate {
            id: user.id,
            email: payload.email,
            phone: payload.phone,
            question: payload.question,
            answer: payload.answer,
        })
        .await?;
    Ok(Json(response))
}

async fn get_information(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ServiceResponse<User>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user_id = state
        .sessions
        .lookup(&token)
        .await
        .ok_or_else(|| ApiError::unauthorized("invalid or expired session"))?;

    // The miss case travels on the success channel; pass it through as-is.
    let response = state.accounts.get_information(user_id).await?;
    Ok(Json(response))
}

async fn check_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ServiceResponse<()>>, ApiError> {
    // A missing or stale session counts as "no user" for the role check.
    let user = state.current_user(&headers).await.ok();
    let response = state.accounts.check_admin_role(user.as_ref());
    Ok(Json(response))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ServiceResponse<()>>, ApiError> {
    let token = require_bearer(&headers)?;
    state.sessions.revoke(&token).await;
    Ok(Json(ServiceResponse::ok_message("logged out")))
}

fn require_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }

    Ok(token.to_string())
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    async {
        if let Err(error) = signal::ctrl_c().await {
            error!(?error, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, HeaderValue, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::sleep;
    use tower::ServiceExt;

    async fn test_state() -> (AppState, TempDir) {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("emporia-test.db");

        let config = emporia_config::DatabaseConfig {
            url: format!("sqlite:{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.expect("initialise database");

        let state = AppState {
            accounts: Arc::new(AccountService::new(pool, TokenStore::default())),
            sessions: SessionStore::new(Duration::from_secs(60)),
        };

        (state, db_dir)
    }

    async fn request(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let body = if let Some(json_body) = body {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json_body).expect("serialize request body"))
        } else {
            Body::empty()
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("dispatch request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect response body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    fn register_body(username: &str, email: &str) -> Value {
        json!({
            "username": username,
            "password": "password123",
            "email": email,
            "phone": "13800000000",
            "question": "first pet?",
            "answer": "rex",
        })
    }

    #[tokio::test]
    async fn session_store_issues_and_revokes_tokens() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.issue(7).await;

        assert_eq!(token.len(), 32);
        assert_eq!(store.lookup(&token).await, Some(7));
        assert!(store.revoke(&token).await);
        assert!(store.lookup(&token).await.is_none());
        assert!(!store.revoke(&token).await);
    }

    #[tokio::test]
    async fn session_store_entries_expire_after_ttl() {
        let store = SessionStore::new(Duration::from_millis(10));
        let token = store.issue(7).await;

        sleep(Duration::from_millis(25)).await;

        assert!(store.lookup(&token).await.is_none());
    }

    #[test]
    fn require_bearer_extracts_token_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer TOKEN123"));

        let token = require_bearer(&headers).expect("token should be extracted");
        assert_eq!(token, "TOKEN123");
    }

    #[test]
    fn require_bearer_rejects_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer"));

        let error = require_bearer(&headers).expect_err("should reject missing token");
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert!(error.message.contains("missing bearer token"));
    }

    #[tokio::test]
    async fn register_login_and_fetch_information() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        let (status, body) = request(
            &router,
            Method::POST,
            "/api/user/register",
            Some(register_body("alice", "alice@example.com")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (status, body) = request(
            &router,
            Method::POST,
            "/api/user/login",
            Some(json!({"username": "alice", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        let token = body["payload"]["token"].as_str().expect("session token").to_string();
        assert_eq!(body["payload"]["user"]["password"], "");

        let (status, body) = request(
            &router,
            Method::GET,
            "/api/user/information",
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["username"], "alice");
        assert_eq!(body["payload"]["password"], "");
    }

    #[tokio::test]
    async fn login_failures_travel_in_the_body() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        let (status, body) = request(
            &router,
            Method::POST,
            "/api/user/login",
            Some(json!({"username": "nobody", "password": "x"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failure");
        assert_eq!(body["message"], "username not found");
    }

    #[tokio::test]
    async fn information_requires_a_session() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        let (status, _) = request(&router, Method::GET, "/api/user/information", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = request(
            &router,
            Method::GET,
            "/api/user/information",
            None,
            Some("not-a-session"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn check_valid_reports_taken_username() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        request(
            &router,
            Method::POST,
            "/api/user/register",
            Some(register_body("alice", "alice@example.com")),
            None,
        )
        .await;

        let (status, body) = request(
            &router,
            Method::GET,
            "/api/user/check_valid?value=alice&kind=username",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failure");
        assert_eq!(body["message"], "username already exists");

        let (_, body) = request(
            &router,
            Method::GET,
            "/api/user/check_valid?value=bob&kind=username",
            None,
            None,
        )
        .await;
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn password_recovery_over_http() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        request(
            &router,
            Method::POST,
            "/api/user/register",
            Some(register_body("alice", "alice@example.com")),
            None,
        )
        .await;

        let (_, body) = request(
            &router,
            Method::GET,
            "/api/user/question?username=alice",
            None,
            None,
        )
        .await;
        assert_eq!(body["payload"], "first pet?");

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/check_answer",
            Some(json!({"username": "alice", "question": "first pet?", "answer": "rex"})),
            None,
        )
        .await;
        assert_eq!(body["status"], "success");
        let token = body["payload"].as_str().expect("recovery token").to_string();

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/forget_reset_password",
            Some(json!({
                "username": "alice",
                "new_password": "resetpass",
                "forget_token": token,
            })),
            None,
        )
        .await;
        assert_eq!(body["status"], "success");

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/login",
            Some(json!({"username": "alice", "password": "resetpass"})),
            None,
        )
        .await;
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn update_information_and_reset_password_flow() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        request(
            &router,
            Method::POST,
            "/api/user/register",
            Some(register_body("alice", "alice@example.com")),
            None,
        )
        .await;

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/login",
            Some(json!({"username": "alice", "password": "password123"})),
            None,
        )
        .await;
        let token = body["payload"]["token"].as_str().unwrap().to_string();

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/update_information",
            Some(json!({"email": "alice@new.example", "phone": "13900000000"})),
            Some(&token),
        )
        .await;
        assert_eq!(body["status"], "success");

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/reset_password",
            Some(json!({"old_password": "password123", "new_password": "changed"})),
            Some(&token),
        )
        .await;
        assert_eq!(body["status"], "success");

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/login",
            Some(json!({"username": "alice", "password": "changed"})),
            None,
        )
        .await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["payload"]["user"]["email"], "alice@new.example");
    }

    #[tokio::test]
    async fn check_admin_rejects_customers_and_anonymous_callers() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        request(
            &router,
            Method::POST,
            "/api/user/register",
            Some(register_body("alice", "alice@example.com")),
            None,
        )
        .await;

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/login",
            Some(json!({"username": "alice", "password": "password123"})),
            None,
        )
        .await;
        let token = body["payload"]["token"].as_str().unwrap().to_string();

        // Registration force-assigns the customer role.
        let (status, body) = request(
            &router,
            Method::GET,
            "/api/user/check_admin",
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failure");

        let (status, body) =
            request(&router, Method::GET, "/api/user/check_admin", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failure");
    }

    #[tokio::test]
    async fn logout_revokes_the_session() {
        let (state, _db_dir) = test_state().await;
        let router = build_router(state);

        request(
            &router,
            Method::POST,
            "/api/user/register",
            Some(register_body("alice", "alice@example.com")),
            None,
        )
        .await;

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/user/login",
            Some(json!({"username": "alice", "password": "password123"})),
            None,
        )
        .await;
        let token = body["payload"]["token"].as_str().unwrap().to_string();

        let (status, _) = request(&router, Method::GET, "/api/user/logout", None, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = request(
            &router,
            Method::GET,
            "/api/user/information",
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
