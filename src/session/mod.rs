use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};

use crate::{
    backend::AuthApi,
    domain::{LoginRequest, Role, User},
    error::Result,
    store::CredentialStore,
};

/// Snapshot of the signed-in identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_token: String,
    pub user_id: String,
    pub role: Role,
    pub email: String,
}

// Token and user are only ever written together.
#[derive(Default)]
struct SessionState {
    token: Option<String>,
    user: Option<User>,
}

/// Owns the bearer credential and the resolved user profile.
///
/// `restore`, `login` and `logout` are serialized so a lifecycle call
/// started while another is in flight observes its completed effects.
pub struct SessionStore {
    auth: Arc<dyn AuthApi>,
    storage: Arc<dyn CredentialStore>,
    token_key: String,
    state: RwLock<SessionState>,
    lifecycle: Mutex<()>,
    loading: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        storage: Arc<dyn CredentialStore>,
        token_key: impl Into<String>,
    ) -> Self {
        let (loading, _) = watch::channel(true);
        Self {
            auth,
            storage,
            token_key: token_key.into(),
            state: RwLock::new(SessionState::default()),
            lifecycle: Mutex::new(()),
            loading,
        }
    }

    /// Resolve a persisted credential into a user. Any failure tears the
    /// session down completely and is not reported as an error.
    pub async fn restore(&self) -> Option<User> {
        let _guard = self.lifecycle.lock().await;

        let stored = match self.storage.get(&self.token_key).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Failed to read stored credential: {}", e);
                None
            }
        };

        let restored = match stored {
            None => {
                tracing::debug!("No stored credential, starting logged out");
                self.clear_state().await;
                None
            }
            Some(token) => match self.auth.me(&token).await {
                Ok(user) => {
                    tracing::info!("Restored session for {} ({})", user.email, user.role.as_str());
                    let mut state = self.state.write().await;
                    state.token = Some(token);
                    state.user = Some(user.clone());
                    Some(user)
                }
                Err(e) => {
                    tracing::info!("Stored credential rejected, logging out: {}", e);
                    if let Err(e) = self.storage.remove(&self.token_key).await {
                        tracing::error!("Failed to clear stored credential: {}", e);
                    }
                    self.clear_state().await;
                    None
                }
            },
        };

        self.loading.send_replace(false);
        restored
    }

    /// Authenticate and persist the credential. On failure nothing changes
    /// and the error is returned as-is.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let _guard = self.lifecycle.lock().await;

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.auth.login(&request).await?;
        self.storage.set(&self.token_key, &response.session_token).await?;

        {
            let mut state = self.state.write().await;
            state.token = Some(response.session_token);
            state.user = Some(response.user.clone());
        }
        self.loading.send_replace(false);

        tracing::info!("Logged in as {} ({})", response.user.email, response.user.role.as_str());
        Ok(response.user)
    }

    /// Invalidate remotely if possible, then clear storage before memory.
    pub async fn logout(&self) {
        let _guard = self.lifecycle.lock().await;

        let token = self.state.read().await.token.clone();
        if let Some(token) = token {
            if let Err(e) = self.auth.logout(&token).await {
                tracing::warn!("Logout request failed, clearing local session anyway: {}", e);
            }
        }

        if let Err(e) = self.storage.remove(&self.token_key).await {
            tracing::error!("Failed to clear stored credential: {}", e);
        }
        self.clear_state().await;
        tracing::info!("Logged out");
    }

    async fn clear_state(&self) {
        let mut state = self.state.write().await;
        state.token = None;
        state.user = None;
    }

    /// The bearer token as of now. Read this at call time rather than
    /// holding on to it.
    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn role(&self) -> Option<Role> {
        self.state.read().await.user.as_ref().map(|u| u.role)
    }

    pub async fn current(&self) -> Option<Session> {
        let state = self.state.read().await;
        match (&state.token, &state.user) {
            (Some(token), Some(user)) => Some(Session {
                session_token: token.clone(),
                user_id: user.id.clone(),
                role: user.role,
                email: user.email.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Resolves once the first `restore` or `login` has settled.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.loading.subscribe();
        // The sender lives as long as self, so this cannot fail.
        let _ = rx.wait_for(|loading| !*loading).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LoginResponse;
    use crate::error::AppError;
    use crate::store::MemoryCredentialStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const KEY: &str = "session_token";

    fn user(role: Role) -> User {
        User {
            id: "u1".into(),
            email: "someone@example.com".into(),
            name: "Someone".into(),
            role,
            phone: None,
        }
    }

    enum MeBehavior {
        Ok,
        Unauthorized,
        Network,
        Malformed,
    }

    struct FakeAuth {
        me: MeBehavior,
        login_ok: bool,
        logout_fails: bool,
        logout_delay: Duration,
        me_calls: AtomicUsize,
        logout_calls: AtomicUsize,
    }

    impl FakeAuth {
        fn new(me: MeBehavior) -> Self {
            Self {
                me,
                login_ok: true,
                logout_fails: false,
                logout_delay: Duration::ZERO,
                me_calls: AtomicUsize::new(0),
                logout_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
            if !self.login_ok {
                return Err(AppError::Api { status: 400, detail: "Invalid credentials".into() });
            }
            let role = if request.email.starts_with("admin") { Role::Admin } else { Role::Member };
            Ok(LoginResponse { session_token: "fresh-token".into(), user: user(role) })
        }

        async fn me(&self, _token: &str) -> Result<User> {
            self.me_calls.fetch_add(1, Ordering::SeqCst);
            match self.me {
                MeBehavior::Ok => Ok(user(Role::Member)),
                MeBehavior::Unauthorized => Err(AppError::Unauthorized),
                MeBehavior::Network => Err(AppError::Network("connection refused".into())),
                MeBehavior::Malformed => Err(AppError::InvalidResponse("missing field `role`".into())),
            }
        }

        async fn logout(&self, _token: &str) -> Result<()> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.logout_delay).await;
            if self.logout_fails {
                Err(AppError::Network("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    fn store_with(auth: FakeAuth, storage: Arc<MemoryCredentialStore>) -> (SessionStore, Arc<FakeAuth>) {
        let auth = Arc::new(auth);
        (SessionStore::new(auth.clone(), storage, KEY), auth)
    }

    #[tokio::test]
    async fn restore_failures_clear_token_and_user_together() {
        for behavior in [MeBehavior::Unauthorized, MeBehavior::Network, MeBehavior::Malformed] {
            let storage = Arc::new(MemoryCredentialStore::with_item(KEY, "stale"));
            let (session, _) = store_with(FakeAuth::new(behavior), storage.clone());

            assert!(session.is_loading());
            assert!(session.restore().await.is_none());

            assert!(session.token().await.is_none());
            assert!(session.user().await.is_none());
            assert!(storage.get(KEY).await.unwrap().is_none());
            assert!(!session.is_loading());
        }
    }

    #[tokio::test]
    async fn restore_success_sets_both() {
        let storage = Arc::new(MemoryCredentialStore::with_item(KEY, "good"));
        let (session, _) = store_with(FakeAuth::new(MeBehavior::Ok), storage);

        let user = session.restore().await.unwrap();
        assert_eq!(user.role, Role::Member);
        let current = session.current().await.unwrap();
        assert_eq!(current.session_token, "good");
        assert_eq!(current.user_id, "u1");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn restore_without_token_skips_network() {
        let storage = Arc::new(MemoryCredentialStore::new());
        let (session, auth) = store_with(FakeAuth::new(MeBehavior::Ok), storage);

        assert!(session.restore().await.is_none());
        assert_eq!(auth.me_calls.load(Ordering::SeqCst), 0);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn failed_login_leaves_existing_session_untouched() {
        let storage = Arc::new(MemoryCredentialStore::with_item(KEY, "good"));
        let mut auth = FakeAuth::new(MeBehavior::Ok);
        auth.login_ok = false;
        let (session, _) = store_with(auth, storage.clone());
        session.restore().await;

        let err = session.login("x@example.com", "bad").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid credentials");
        assert_eq!(session.token().await.as_deref(), Some("good"));
        assert_eq!(storage.get(KEY).await.unwrap().as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn login_returns_profile_for_role_branching() {
        let storage = Arc::new(MemoryCredentialStore::new());
        let (session, _) = store_with(FakeAuth::new(MeBehavior::Ok), storage.clone());

        let user = session.login("admin@example.com", "validpass").await.unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(storage.get(KEY).await.unwrap().as_deref(), Some("fresh-token"));
        assert_eq!(session.role().await, Some(Role::Admin));
    }

    #[tokio::test]
    async fn logout_clears_locally_even_when_server_fails() {
        let storage = Arc::new(MemoryCredentialStore::with_item(KEY, "good"));
        let mut auth = FakeAuth::new(MeBehavior::Ok);
        auth.logout_fails = true;
        let (session, auth) = store_with(auth, storage.clone());
        session.restore().await;

        session.logout().await;
        assert_eq!(auth.logout_calls.load(Ordering::SeqCst), 1);
        assert!(session.current().await.is_none());
        assert!(storage.get(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_started_during_logout_sees_no_token() {
        let storage = Arc::new(MemoryCredentialStore::with_item(KEY, "good"));
        let mut auth = FakeAuth::new(MeBehavior::Ok);
        auth.logout_delay = Duration::from_millis(50);
        let (session, auth) = store_with(auth, storage.clone());
        let session = Arc::new(session);
        session.restore().await;
        assert_eq!(auth.me_calls.load(Ordering::SeqCst), 1);

        let logging_out = {
            let session = session.clone();
            tokio::spawn(async move { session.logout().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(session.restore().await.is_none());
        logging_out.await.unwrap();

        assert_eq!(auth.me_calls.load(Ordering::SeqCst), 1);
        assert!(session.current().await.is_none());
    }

    #[tokio::test]
    async fn wait_until_ready_resolves_after_restore() {
        let storage = Arc::new(MemoryCredentialStore::new());
        let (session, _) = store_with(FakeAuth::new(MeBehavior::Ok), storage);
        let session = Arc::new(session);

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.wait_until_ready().await })
        };
        session.restore().await;
        waiter.await.unwrap();
    }
}
