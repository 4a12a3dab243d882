use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    backend::PaymentApi,
    domain::ReceiptHandle,
    error::{AppError, Result},
    session::SessionStore,
};

/// Turns a completed payment id into something the user can open or share.
pub struct ReceiptRetriever {
    session: Arc<SessionStore>,
    api: Arc<dyn PaymentApi>,
    download_dir: Option<PathBuf>,
}

impl ReceiptRetriever {
    /// With a `download_dir` receipts are saved as files; without one the
    /// direct URL is returned.
    pub fn new(session: Arc<SessionStore>, api: Arc<dyn PaymentApi>, download_dir: Option<PathBuf>) -> Self {
        Self {
            session,
            api,
            download_dir,
        }
    }

    pub async fn fetch(&self, payment_id: &str) -> Result<ReceiptHandle> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Err(AppError::Validation("Payment ID not found".to_string()));
        }

        let Some(dir) = &self.download_dir else {
            return Ok(ReceiptHandle::Url(self.api.receipt_url(payment_id)));
        };

        let token = self.session.token().await.ok_or(AppError::Unauthorized)?;
        let bytes = self.api.receipt_pdf(&token, payment_id).await.map_err(|e| {
            tracing::error!("Error downloading receipt for {}: {}", payment_id, e);
            match e {
                AppError::Unauthorized => AppError::Unauthorized,
                other => AppError::Receipt(
                    other
                        .detail()
                        .unwrap_or("Failed to download receipt")
                        .to_string(),
                ),
            }
        })?;

        if bytes.is_empty() {
            return Err(AppError::Receipt("Receipt is empty".to_string()));
        }

        let path = dir.join(receipt_file_name(payment_id));
        save(dir, &path, &bytes).await.map_err(|e| {
            tracing::error!("Failed to save receipt to {}: {}", path.display(), e);
            AppError::Receipt("Failed to save receipt".to_string())
        })?;

        tracing::info!("Receipt for {} saved to {}", payment_id, path.display());
        Ok(ReceiptHandle::File(path))
    }
}

async fn save(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, bytes).await
}

fn receipt_file_name(payment_id: &str) -> String {
    let safe: String = payment_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("receipt_{}.pdf", safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_path_characters() {
        assert_eq!(receipt_file_name("pay_AbC123"), "receipt_pay_AbC123.pdf");
        assert_eq!(receipt_file_name("../etc/passwd"), "receipt____etc_passwd.pdf");
    }
}
