use std::sync::Arc;
use tokio::sync::watch;

use crate::{
    backend::OverdueApi,
    domain::{OverdueRecord, OverdueSummary, Role},
    error::Result,
    session::SessionStore,
};

/// What the cache currently knows about the member's standing.
#[derive(Debug, Clone, PartialEq)]
pub enum OverdueStatus {
    /// Nothing fetched yet, or nobody signed in.
    NotLoaded,
    /// Signed-in role is never restricted; no fetch was made.
    Exempt,
    /// The last fetch failed. Not the same as "confirmed clear".
    Failed,
    Loaded(OverdueSummary),
}

impl OverdueStatus {
    pub fn summary(&self) -> Option<&OverdueSummary> {
        match self {
            OverdueStatus::Loaded(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Per-session view of the member's payment standing. Refreshing is
/// caller-driven: after a successful payment, or when a screen mounts.
pub struct OverdueStatusCache {
    session: Arc<SessionStore>,
    api: Arc<dyn OverdueApi>,
    status: watch::Sender<OverdueStatus>,
}

impl OverdueStatusCache {
    pub fn new(session: Arc<SessionStore>, api: Arc<dyn OverdueApi>) -> Self {
        let (status, _) = watch::channel(OverdueStatus::NotLoaded);
        Self { session, api, status }
    }

    /// Fetch the summary for members. Waits for the session to finish
    /// restoring so the role is known before deciding.
    pub async fn refresh(&self) -> OverdueStatus {
        self.session.wait_until_ready().await;

        let token = self.session.token().await;
        let next = match (self.session.role().await, &token) {
            (Some(Role::Member), Some(token)) => self.fetch_summary(token).await,
            (Some(Role::Member), None) | (None, _) => OverdueStatus::NotLoaded,
            (Some(_), _) => OverdueStatus::Exempt,
        };

        // A logout or re-login while the fetch was in flight owns the
        // cache now; this result belongs to a session that is gone.
        if self.session.token().await != token {
            tracing::debug!("Session changed during overdue refresh, discarding result");
            return self.status();
        }

        self.status.send_replace(next.clone());
        next
    }

    async fn fetch_summary(&self, token: &str) -> OverdueStatus {
        match self.api.member_summary(token).await {
            Ok(summary) => {
                if !summary.is_consistent() {
                    tracing::warn!(
                        "Overdue summary for {} has inconsistent flags (count={}, has_overdue={}, restricted={})",
                        summary.member_id,
                        summary.overdue_count,
                        summary.has_overdue,
                        summary.restricted_access
                    );
                }
                tracing::debug!(
                    "Overdue summary loaded: {} items, restricted={}",
                    summary.overdue_count,
                    summary.restricted_access
                );
                OverdueStatus::Loaded(summary)
            }
            Err(e) => {
                tracing::error!("Error fetching overdue status: {}", e);
                OverdueStatus::Failed
            }
        }
    }

    /// Itemized overdue records. Empty for non-members without a fetch.
    pub async fn details(&self) -> Result<Vec<OverdueRecord>> {
        if self.session.role().await != Some(Role::Member) {
            return Ok(Vec::new());
        }
        let Some(token) = self.session.token().await else {
            return Ok(Vec::new());
        };
        self.api.member_details(&token).await
    }

    pub fn status(&self) -> OverdueStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OverdueStatus> {
        self.status.subscribe()
    }

    pub fn summary(&self) -> Option<OverdueSummary> {
        self.status.borrow().summary().cloned()
    }

    pub fn is_access_restricted(&self) -> bool {
        self.status
            .borrow()
            .summary()
            .map(|s| s.restricted_access)
            .unwrap_or(false)
    }

    pub fn has_overdue(&self) -> bool {
        self.status
            .borrow()
            .summary()
            .map(|s| s.has_overdue)
            .unwrap_or(false)
    }

    /// Drop whatever was cached, e.g. on logout.
    pub fn clear(&self) {
        self.status.send_replace(OverdueStatus::NotLoaded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AuthApi;
    use crate::domain::{LoginRequest, LoginResponse, User};
    use crate::error::AppError;
    use crate::store::MemoryCredentialStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct RoleAuth(Role);

    #[async_trait]
    impl AuthApi for RoleAuth {
        async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse> {
            Err(AppError::Unauthorized)
        }

        async fn me(&self, _token: &str) -> Result<User> {
            Ok(User {
                id: "m-42".into(),
                email: "member@example.com".into(),
                name: String::new(),
                role: self.0,
                phone: None,
            })
        }

        async fn logout(&self, _token: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeOverdue {
        summary: Option<OverdueSummary>,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OverdueApi for FakeOverdue {
        async fn member_summary(&self, _token: &str) -> Result<OverdueSummary> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.summary
                .clone()
                .ok_or_else(|| AppError::Network("timed out".into()))
        }

        async fn member_details(&self, _token: &str) -> Result<Vec<OverdueRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn restricted_summary() -> OverdueSummary {
        OverdueSummary {
            member_id: "m-42".into(),
            has_overdue: true,
            overdue_count: 2,
            total_overdue_amount: Decimal::from(750),
            oldest_overdue_days: 40,
            restricted_access: true,
            overdue_items: Vec::new(),
        }
    }

    async fn cache_for(role: Role, summary: Option<OverdueSummary>) -> (OverdueStatusCache, Arc<FakeOverdue>) {
        let (cache, _, api) = slow_cache_for(role, summary, Duration::ZERO).await;
        (cache, api)
    }

    async fn slow_cache_for(
        role: Role,
        summary: Option<OverdueSummary>,
        delay: Duration,
    ) -> (OverdueStatusCache, Arc<SessionStore>, Arc<FakeOverdue>) {
        let storage = Arc::new(MemoryCredentialStore::with_item("session_token", "tok"));
        let session = Arc::new(SessionStore::new(Arc::new(RoleAuth(role)), storage, "session_token"));
        session.restore().await;
        let api = Arc::new(FakeOverdue { summary, delay, calls: AtomicUsize::new(0) });
        (OverdueStatusCache::new(session.clone(), api.clone()), session, api)
    }

    #[tokio::test]
    async fn admin_refresh_makes_no_network_call() {
        let (cache, api) = cache_for(Role::Admin, Some(restricted_summary())).await;

        assert_eq!(cache.refresh().await, OverdueStatus::Exempt);
        assert!(cache.details().await.unwrap().is_empty());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert!(!cache.is_access_restricted());
    }

    #[tokio::test]
    async fn restriction_reflects_loaded_summary() {
        let (cache, api) = cache_for(Role::Member, Some(restricted_summary())).await;
        assert!(!cache.is_access_restricted());

        cache.refresh().await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_access_restricted());
        assert!(cache.is_access_restricted());
        assert!(cache.has_overdue());
        assert_eq!(cache.summary().unwrap().overdue_count, 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_distinguishable_from_clear() {
        let (cache, _) = cache_for(Role::Member, None).await;

        assert_eq!(cache.refresh().await, OverdueStatus::Failed);
        assert!(!cache.is_access_restricted());
        assert!(cache.summary().is_none());
    }

    #[tokio::test]
    async fn clear_discards_summary() {
        let (cache, _) = cache_for(Role::Member, Some(restricted_summary())).await;
        cache.refresh().await;

        cache.clear();
        assert_eq!(cache.status(), OverdueStatus::NotLoaded);
        assert!(!cache.is_access_restricted());
    }

    #[tokio::test]
    async fn refresh_finishing_after_logout_is_discarded() {
        let (cache, session, _) =
            slow_cache_for(Role::Member, Some(restricted_summary()), Duration::from_millis(300)).await;

        let (status, _) = tokio::join!(cache.refresh(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.logout().await;
            cache.clear();
        });

        assert_eq!(status, OverdueStatus::NotLoaded);
        assert!(session.current().await.is_none());
        assert_eq!(cache.status(), OverdueStatus::NotLoaded);
        assert!(!cache.is_access_restricted());
    }
}
