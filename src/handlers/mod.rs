pub mod admin;
pub mod membership;
pub mod payment;
pub mod purchase;

pub use admin::admin_config;
pub use membership::membership_config;
pub use payment::payment_config;
pub use purchase::purchase_config;
