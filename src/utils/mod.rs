pub mod jwt;
pub mod money;

pub use jwt::*;
pub use money::{discount_percent, format_amount};
