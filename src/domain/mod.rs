pub mod user;
pub mod overdue;
pub mod payment;

pub use user::*;
pub use overdue::*;
pub use payment::*;
