pub mod backend;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod gate;
pub mod overdue;
pub mod payments;
pub mod session;
pub mod store;

pub use context::{ClientContext, PaymentOutcome};
pub use error::{AppError, Result};
