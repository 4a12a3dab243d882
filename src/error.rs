use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Order creation failed: {0}")]
    OrderCreation(String),

    #[error("Payment verification failed: {0}")]
    Verification(String),

    #[error("Payment cancelled by user")]
    CheckoutCancelled,

    #[error("Checkout error: {0}")]
    Checkout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Receipt error: {0}")]
    Receipt(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AppError {
    /// Text suitable for showing to the person using the app.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => "Unable to reach the server. Please check your connection.".to_string(),
            AppError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            AppError::Api { detail, .. } => detail.clone(),
            AppError::Configuration(_) => "Failed to load payment configuration".to_string(),
            AppError::OrderCreation(msg) => msg.clone(),
            AppError::Verification(msg) => msg.clone(),
            AppError::CheckoutCancelled => "Payment cancelled".to_string(),
            AppError::Checkout(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access local storage".to_string(),
            AppError::Receipt(msg) => msg.clone(),
            AppError::InvalidResponse(_) => "Unexpected response from the server".to_string(),
        }
    }

    /// The server-provided detail string, if this error carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            AppError::Api { detail, .. } => Some(detail.as_str()),
            _ => None,
        }
    }

    /// Build an API error from a non-success status and its raw body.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 401 {
            return AppError::Unauthorized;
        }
        let detail = extract_detail(body).unwrap_or_else(|| format!("Request failed with status {}", status));
        AppError::Api { status, detail }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Pull the `detail` field out of a backend error body. The backend sends
/// either a plain string or a list of validation entries with a `msg` each.
pub fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|msg| msg.as_str())
            .map(str::to_string),
        _ => None,
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::InvalidResponse(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_extracted() {
        let body = r#"{"detail": "Signature mismatch"}"#;
        assert_eq!(extract_detail(body).as_deref(), Some("Signature mismatch"));
    }

    #[test]
    fn detail_validation_list_uses_first_msg() {
        let body = r#"{"detail": [{"loc": ["body", "amount"], "msg": "amount too low", "type": "value_error"}]}"#;
        assert_eq!(extract_detail(body).as_deref(), Some("amount too low"));
    }

    #[test]
    fn non_json_body_falls_back_to_status_message() {
        let err = AppError::from_status(502, "<html>bad gateway</html>");
        assert_eq!(err.user_message(), "Request failed with status 502");
    }

    #[test]
    fn unauthorized_status_maps_to_unauthorized() {
        assert!(matches!(AppError::from_status(401, "{}"), AppError::Unauthorized));
    }
}
