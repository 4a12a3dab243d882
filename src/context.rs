use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    backend::{AuthApi, HttpBackend, OverdueApi, PaymentApi},
    config::Settings,
    domain::{ContributionKind, PaymentResult, ReceiptHandle, User},
    error::Result,
    gate::{AccessGate, Denial, GateDecision, ProtectedAction},
    overdue::OverdueStatusCache,
    payments::{CheckoutUi, PaymentOrchestrator, ReceiptRetriever},
    session::SessionStore,
    store::{CredentialStore, SqliteCredentialStore},
};

/// How a gated payment request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The gate refused before anything was created.
    Denied(Denial),
    Completed(PaymentResult),
}

fn contribution_action(kind: ContributionKind) -> ProtectedAction {
    match kind {
        ContributionKind::Welfare => ProtectedAction::WelfareContribution,
        ContributionKind::Educational => ProtectedAction::EducationalContribution,
    }
}

/// Everything a screen or command needs, wired once and passed around
/// explicitly.
pub struct ClientContext {
    pub session: Arc<SessionStore>,
    pub overdue: Arc<OverdueStatusCache>,
    pub gate: AccessGate,
    pub payments: Arc<PaymentOrchestrator>,
    pub receipts: Arc<ReceiptRetriever>,
}

impl ClientContext {
    pub fn new(
        settings: &Settings,
        auth: Arc<dyn AuthApi>,
        overdue_api: Arc<dyn OverdueApi>,
        payment_api: Arc<dyn PaymentApi>,
        storage: Arc<dyn CredentialStore>,
        checkout: Arc<dyn CheckoutUi>,
    ) -> Self {
        let session = Arc::new(SessionStore::new(auth, storage, settings.storage.token_key.clone()));
        let overdue = Arc::new(OverdueStatusCache::new(session.clone(), overdue_api));
        let payments = Arc::new(PaymentOrchestrator::new(session.clone(), payment_api.clone(), checkout));
        let receipts = Arc::new(ReceiptRetriever::new(
            session.clone(),
            payment_api,
            settings.payments.receipt_dir.clone(),
        ));

        Self {
            session,
            overdue,
            gate: AccessGate::new(settings.payments.fail_closed_on_unknown_overdue),
            payments,
            receipts,
        }
    }

    /// Wire the HTTP backend and the SQLite credential store from settings.
    pub async fn from_settings(settings: &Settings, checkout: Arc<dyn CheckoutUi>) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(&settings.api)?);
        let storage = Arc::new(SqliteCredentialStore::connect(&settings.storage.database_url).await?);

        Ok(Self::new(
            settings,
            backend.clone(),
            backend.clone(),
            backend,
            storage,
            checkout,
        ))
    }

    /// Restore any persisted session, then load standing for members.
    pub async fn start(&self) -> Option<User> {
        let user = self.session.restore().await;
        if user.is_some() {
            self.overdue.refresh().await;
        }
        user
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self.session.login(email, password).await?;
        self.overdue.refresh().await;
        Ok(user)
    }

    pub async fn logout(&self) {
        self.session.logout().await;
        self.overdue.clear();
    }

    pub async fn check_access(&self, action: ProtectedAction) -> GateDecision {
        let role = self.session.role().await;
        self.gate.decide(role, &self.overdue.status(), action)
    }

    /// Ask the gate, validate, pay, and on success reload standing so
    /// restricted screens unlock.
    pub async fn pay_contribution(
        &self,
        member_id: &str,
        kind: ContributionKind,
        amount: Decimal,
    ) -> PaymentOutcome {
        if let GateDecision::Deny(denial) = self.check_access(contribution_action(kind)).await {
            tracing::info!("Contribution refused: {}", denial.message());
            return PaymentOutcome::Denied(denial);
        }

        if let Err(e) = kind.validate_amount(amount) {
            return PaymentOutcome::Completed(PaymentResult::failed(&e));
        }

        let result = self.payments.process_contribution_payment(member_id, amount).await;
        if result.is_success() {
            self.overdue.refresh().await;
        }
        PaymentOutcome::Completed(result)
    }

    pub async fn pay_subscription(&self, plan_id: &str, amount: Decimal) -> PaymentResult {
        let result = self.payments.process_subscription_payment(plan_id, amount).await;
        if result.is_success() {
            self.overdue.refresh().await;
        }
        result
    }

    pub async fn receipt(&self, payment_id: &str) -> Result<ReceiptHandle> {
        self.receipts.fetch(payment_id).await
    }
}
