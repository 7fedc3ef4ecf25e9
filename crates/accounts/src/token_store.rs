//! Process-wide cache for password-recovery tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_PREFIX: &str = "token_";
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(43_200);

/// Ephemeral `username -> recovery token` map.
///
/// Entries are keyed by a username-scoped key and overwritten by newer
/// writes for the same username (last write wins). Expired entries are
/// pruned on every access; there is no atomicity across a caller's
/// get-then-compare sequence.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Store a token for the username, replacing any previous one.
    pub async fn set(&self, username: &str, token: String) {
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        guard.insert(Self::cache_key(username), (token, Instant::now()));
    }

    /// Fetch the live token for the username, if any.
    pub async fn get(&self, username: &str) -> Option<String> {
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        guard
            .get(&Self::cache_key(username))
            .map(|(token, _)| token.clone())
    }

    fn cache_key(username: &str) -> String {
        format!("{TOKEN_PREFIX}{username}")
    }

    fn prune(map: &mut HashMap<String, (String, Instant)>, ttl: Duration) {
        let now = Instant::now();
        map.retain(|_, (_, created)| now.duration_since(*created) <= ttl);
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}
