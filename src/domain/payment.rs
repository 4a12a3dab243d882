use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Gateway settings served by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentConfig {
    pub razorpay_key_id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub theme_color: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// What a payment is for, carrying the id the backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentContext {
    Contribution { member_id: String },
    Subscription { plan_id: String },
}

impl PaymentContext {
    pub fn payment_type(&self) -> &'static str {
        match self {
            PaymentContext::Contribution { .. } => "contribution",
            PaymentContext::Subscription { .. } => "subscription",
        }
    }

    pub fn member_id(&self) -> Option<&str> {
        match self {
            PaymentContext::Contribution { member_id } => Some(member_id),
            PaymentContext::Subscription { .. } => None,
        }
    }

    pub fn plan_id(&self) -> Option<&str> {
        match self {
            PaymentContext::Subscription { plan_id } => Some(plan_id),
            PaymentContext::Contribution { .. } => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PaymentContext::Contribution { .. } => "Member contribution",
            PaymentContext::Subscription { .. } => "Subscription plan",
        }
    }
}

/// Amounts are in major currency units.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub amount: Decimal,
    pub payment_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub notes: serde_json::Value,
}

impl CreateOrderRequest {
    pub fn new(amount: Decimal, context: &PaymentContext, notes: serde_json::Value) -> Self {
        Self {
            amount,
            payment_type: context.payment_type().to_string(),
            member_id: context.member_id().map(str::to_string),
            plan_id: context.plan_id().map(str::to_string),
            notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub razorpay_key_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    pub payment_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

/// Terminal outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentResult {
    Success {
        payment_id: String,
        order_id: String,
        signature: String,
        data: serde_json::Value,
    },
    Failed {
        error: String,
        kind: FailureKind,
    },
}

/// Which step of the run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    OrderCreation,
    Cancelled,
    Checkout,
    /// The gateway may have taken the money; the user should contact
    /// support rather than pay again.
    Verification,
    Other,
}

impl PaymentResult {
    pub fn failed(error: &AppError) -> Self {
        let kind = match error {
            AppError::Configuration(_) => FailureKind::Configuration,
            AppError::OrderCreation(_) => FailureKind::OrderCreation,
            AppError::CheckoutCancelled => FailureKind::Cancelled,
            AppError::Checkout(_) => FailureKind::Checkout,
            AppError::Verification(_) => FailureKind::Verification,
            _ => FailureKind::Other,
        };
        PaymentResult::Failed {
            error: error.user_message(),
            kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentResult::Success { .. })
    }

    pub fn payment_id(&self) -> Option<&str> {
        match self {
            PaymentResult::Success { payment_id, .. } => Some(payment_id),
            PaymentResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PaymentResult::Failed { error, .. } => Some(error),
            PaymentResult::Success { .. } => None,
        }
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self, PaymentResult::Failed { kind: FailureKind::Cancelled, .. })
    }
}

/// Where a fetched receipt can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptHandle {
    Url(String),
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionKind {
    Welfare,
    Educational,
}

impl ContributionKind {
    pub fn minimum(self) -> Decimal {
        match self {
            ContributionKind::Welfare => Decimal::from(100),
            ContributionKind::Educational => Decimal::from(5_000),
        }
    }

    pub fn maximum(self) -> Option<Decimal> {
        match self {
            ContributionKind::Welfare => None,
            ContributionKind::Educational => Some(Decimal::from(100_000)),
        }
    }

    /// Local check only; the backend must still re-validate.
    pub fn validate_amount(self, amount: Decimal) -> Result<()> {
        if amount < self.minimum() {
            return Err(AppError::Validation(format!(
                "Minimum amount is ₹{}",
                self.minimum()
            )));
        }
        if let Some(max) = self.maximum() {
            if amount > max {
                return Err(AppError::Validation(format!("Maximum amount is ₹{}", max)));
            }
        }
        Ok(())
    }
}
