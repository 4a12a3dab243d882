pub mod checkout;
pub mod orchestrator;
pub mod receipt;

pub use checkout::{CheckoutOptions, CheckoutPrefill, CheckoutSuccess, CheckoutUi};
pub use orchestrator::{PaymentIntent, PaymentOrchestrator, PaymentStage};
pub use receipt::ReceiptRetriever;
