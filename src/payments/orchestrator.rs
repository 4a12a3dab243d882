use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::{
    backend::PaymentApi,
    domain::{CreateOrderRequest, PaymentConfig, PaymentContext, PaymentOrder, PaymentResult, VerifyPaymentRequest},
    error::{AppError, Result},
    payments::checkout::{to_minor_units, CheckoutOptions, CheckoutPrefill, CheckoutSuccess, CheckoutUi},
    session::SessionStore,
};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStage {
    Idle,
    ConfigLoaded,
    OrderCreated,
    CheckoutOpen,
    Verifying,
    Succeeded,
    Failed,
}

impl PaymentStage {
    pub fn is_busy(self) -> bool {
        !matches!(self, PaymentStage::Idle | PaymentStage::Succeeded | PaymentStage::Failed)
    }
}

/// One payment the user wants to make. Amount is in major units.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub amount: Decimal,
    pub context: PaymentContext,
    pub notes: serde_json::Value,
}

/// Takes a payment from intent to a verified (or failed) outcome. Never
/// retries and never navigates; callers decide what happens next.
pub struct PaymentOrchestrator {
    session: Arc<SessionStore>,
    api: Arc<dyn PaymentApi>,
    checkout: Arc<dyn CheckoutUi>,
    stage: watch::Sender<PaymentStage>,
    in_flight: Mutex<()>,
}

impl PaymentOrchestrator {
    pub fn new(
        session: Arc<SessionStore>,
        api: Arc<dyn PaymentApi>,
        checkout: Arc<dyn CheckoutUi>,
    ) -> Self {
        let (stage, _) = watch::channel(PaymentStage::Idle);
        Self {
            session,
            api,
            checkout,
            stage,
            in_flight: Mutex::new(()),
        }
    }

    pub fn stage(&self) -> PaymentStage {
        *self.stage.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentStage> {
        self.stage.subscribe()
    }

    pub async fn process_contribution_payment(&self, member_id: &str, amount: Decimal) -> PaymentResult {
        self.run(PaymentIntent {
            amount,
            context: PaymentContext::Contribution { member_id: member_id.to_string() },
            notes: serde_json::json!({ "member_id": member_id }),
        })
        .await
    }

    pub async fn process_subscription_payment(&self, plan_id: &str, amount: Decimal) -> PaymentResult {
        self.run(PaymentIntent {
            amount,
            context: PaymentContext::Subscription { plan_id: plan_id.to_string() },
            notes: serde_json::json!({ "plan_id": plan_id }),
        })
        .await
    }

    /// Run the state machine once from `Idle`.
    pub async fn run(&self, intent: PaymentIntent) -> PaymentResult {
        let Ok(_running) = self.in_flight.try_lock() else {
            tracing::warn!("Payment requested while another is in progress");
            return PaymentResult::failed(&AppError::Checkout(
                "A payment is already in progress".to_string(),
            ));
        };

        self.set_stage(PaymentStage::Idle);
        match self.drive(&intent).await {
            Ok((success, data)) => {
                self.set_stage(PaymentStage::Succeeded);
                tracing::info!(
                    "Payment {} verified for order {} ({})",
                    success.razorpay_payment_id,
                    success.razorpay_order_id,
                    intent.context.payment_type()
                );
                PaymentResult::Success {
                    payment_id: success.razorpay_payment_id,
                    order_id: success.razorpay_order_id,
                    signature: success.razorpay_signature,
                    data,
                }
            }
            Err(e) => {
                self.set_stage(PaymentStage::Failed);
                if matches!(e, AppError::CheckoutCancelled) {
                    tracing::info!("Payment cancelled by user");
                } else {
                    tracing::error!("Payment failed: {}", e);
                }
                PaymentResult::failed(&e)
            }
        }
    }

    async fn drive(&self, intent: &PaymentIntent) -> Result<(CheckoutSuccess, serde_json::Value)> {
        if intent.amount <= Decimal::ZERO {
            return Err(AppError::Validation("Amount must be greater than zero".to_string()));
        }
        // The order and the checkout must agree to the paisa.
        if intent.amount.normalize().scale() > 2 {
            return Err(AppError::Validation(
                "Amount cannot have more than two decimal places".to_string(),
            ));
        }

        let config = self
            .api
            .config(&self.current_token().await?)
            .await
            .map_err(|e| {
                tracing::error!("Error loading payment config: {}", e);
                AppError::Configuration(e.to_string())
            })?;
        self.set_stage(PaymentStage::ConfigLoaded);

        let request = CreateOrderRequest::new(intent.amount, &intent.context, intent.notes.clone());
        let order = self
            .api
            .create_order(&self.current_token().await?, &request)
            .await
            .map_err(|e| {
                AppError::OrderCreation(
                    e.detail()
                        .unwrap_or("Failed to create payment order")
                        .to_string(),
                )
            })?;
        self.set_stage(PaymentStage::OrderCreated);

        let options = self.checkout_options(&config, &order, intent).await?;
        self.set_stage(PaymentStage::CheckoutOpen);
        let success = self.checkout.open(options).await?;

        self.set_stage(PaymentStage::Verifying);
        let verify = VerifyPaymentRequest {
            razorpay_order_id: success.razorpay_order_id.clone(),
            razorpay_payment_id: success.razorpay_payment_id.clone(),
            razorpay_signature: success.razorpay_signature.clone(),
            payment_type: intent.context.payment_type().to_string(),
            member_id: intent.context.member_id().map(str::to_string),
            plan_id: intent.context.plan_id().map(str::to_string),
        };
        let data = self
            .api
            .verify(&self.current_token().await?, &verify)
            .await
            .map_err(|e| {
                AppError::Verification(
                    e.detail()
                        .unwrap_or("Payment verification failed")
                        .to_string(),
                )
            })?;

        Ok((success, data))
    }

    async fn checkout_options(
        &self,
        config: &PaymentConfig,
        order: &PaymentOrder,
        intent: &PaymentIntent,
    ) -> Result<CheckoutOptions> {
        let prefill = match self.session.user().await {
            Some(user) => CheckoutPrefill {
                email: user.email,
                contact: user.phone.unwrap_or_default(),
            },
            None => CheckoutPrefill::default(),
        };

        let key = if order.razorpay_key_id.is_empty() {
            config.razorpay_key_id.clone()
        } else {
            order.razorpay_key_id.clone()
        };

        Ok(CheckoutOptions {
            key,
            amount: to_minor_units(intent.amount)?,
            currency: order.currency.clone(),
            name: config
                .business_name
                .clone()
                .unwrap_or_else(|| "TLC Library".to_string()),
            description: intent.context.description().to_string(),
            order_id: order.order_id.clone(),
            prefill,
            theme_color: config.theme_color.clone(),
        })
    }

    async fn current_token(&self) -> Result<String> {
        self.session.token().await.ok_or(AppError::Unauthorized)
    }

    fn set_stage(&self, stage: PaymentStage) {
        tracing::debug!("Payment stage: {:?}", stage);
        self.stage.send_replace(stage);
    }
}
