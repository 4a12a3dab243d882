use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::{
    backend::{AuthApi, OverdueApi, PaymentApi},
    config::ApiConfig,
    domain::*,
    error::{AppError, Result},
};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Backend returned {}: {}", status, body);
        Err(AppError::from_status(status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T> {
        let request = self.client.get(self.url(path)).bearer_auth(token);
        Ok(self.send(request).await?.json().await?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(self.send(request).await?.json().await?)
    }
}

#[async_trait]
impl AuthApi for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        // A 401 here means bad credentials, not an expired session.
        self.post_json("/api/auth/login", None, request)
            .await
            .map_err(|e| match e {
                AppError::Unauthorized => AppError::Api {
                    status: 401,
                    detail: "Invalid email or password".to_string(),
                },
                other => other,
            })
    }

    async fn me(&self, token: &str) -> Result<User> {
        self.get_json("/api/auth/me", token).await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let request = self.client.post(self.url("/api/auth/logout")).bearer_auth(token);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl OverdueApi for HttpBackend {
    async fn member_summary(&self, token: &str) -> Result<OverdueSummary> {
        self.get_json("/api/overdue/member/summary", token).await
    }

    async fn member_details(&self, token: &str) -> Result<Vec<OverdueRecord>> {
        self.get_json("/api/overdue/member/details", token).await
    }
}

#[async_trait]
impl PaymentApi for HttpBackend {
    async fn config(&self, token: &str) -> Result<PaymentConfig> {
        self.get_json("/api/payment/config", token).await
    }

    async fn create_order(&self, token: &str, request: &CreateOrderRequest) -> Result<PaymentOrder> {
        self.post_json("/api/payment/create-order", Some(token), request).await
    }

    async fn verify(&self, token: &str, request: &VerifyPaymentRequest) -> Result<serde_json::Value> {
        self.post_json("/api/payment/verify", Some(token), request).await
    }

    fn receipt_url(&self, payment_id: &str) -> String {
        self.url(&format!(
            "/api/payment/receipt/{}",
            urlencoding::encode(payment_id)
        ))
    }

    async fn receipt_pdf(&self, token: &str, payment_id: &str) -> Result<Vec<u8>> {
        let request = self.client.get(self.receipt_url(payment_id)).bearer_auth(token);
        let bytes = self.send(request).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
