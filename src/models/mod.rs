pub mod common;
pub mod membership;
pub mod payment_transaction;

pub use common::*;
pub use membership::*;
pub use payment_transaction::*;
