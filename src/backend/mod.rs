//! Contracts for the remote TLC Library backend.
//!
//! The backend owns authentication, overdue computation, order creation,
//! signature verification and receipt rendering. These traits are the
//! only way the rest of the crate talks to it; `HttpBackend` implements
//! all of them over HTTP.

use async_trait::async_trait;

use crate::{
    domain::*,
    error::Result,
};

pub mod http;

pub use http::HttpBackend;

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse>;
    async fn me(&self, token: &str) -> Result<User>;
    async fn logout(&self, token: &str) -> Result<()>;
}

#[async_trait]
pub trait OverdueApi: Send + Sync {
    async fn member_summary(&self, token: &str) -> Result<OverdueSummary>;
    async fn member_details(&self, token: &str) -> Result<Vec<OverdueRecord>>;
}

#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn config(&self, token: &str) -> Result<PaymentConfig>;
    async fn create_order(&self, token: &str, request: &CreateOrderRequest) -> Result<PaymentOrder>;
    async fn verify(&self, token: &str, request: &VerifyPaymentRequest) -> Result<serde_json::Value>;
    /// Absolute URL of a receipt document.
    fn receipt_url(&self, payment_id: &str) -> String;
    async fn receipt_pdf(&self, token: &str, payment_id: &str) -> Result<Vec<u8>>;
}
