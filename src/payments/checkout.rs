use async_trait::async_trait;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Everything the gateway's checkout needs to open. `amount` is in minor
/// units (paise); nothing else in the crate uses minor units.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutOptions {
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: CheckoutPrefill,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CheckoutPrefill {
    pub email: String,
    pub contact: String,
}

/// Identifiers the gateway hands back after a completed payment.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSuccess {
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

/// The third-party checkout surface. Suspends until the user pays or
/// backs out. Backing out must come back as `AppError::CheckoutCancelled`.
#[async_trait]
pub trait CheckoutUi: Send + Sync {
    async fn open(&self, options: CheckoutOptions) -> Result<CheckoutSuccess>;
}

/// Major units to the gateway's minor units. Never rounds: an amount
/// that is not a whole number of paise is an error.
pub(crate) fn to_minor_units(amount: Decimal) -> Result<i64> {
    let minor = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| AppError::Validation(format!("Amount {} is out of range", amount)))?;
    if !minor.fract().is_zero() {
        return Err(AppError::Validation(format!(
            "Amount {} has more than two decimal places",
            amount
        )));
    }
    minor
        .to_i64()
        .ok_or_else(|| AppError::Validation(format!("Amount {} is out of range", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn rupees_become_paise() {
        assert_eq!(to_minor_units(Decimal::from(100)).unwrap(), 10_000);
        assert_eq!(to_minor_units(Decimal::from_str("499.99").unwrap()).unwrap(), 49_999);
        assert_eq!(to_minor_units(Decimal::from_str("250.50").unwrap()).unwrap(), 25_050);
    }

    #[test]
    fn fractional_paise_are_rejected_not_rounded() {
        let err = to_minor_units(Decimal::from_str("100.005").unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
