pub mod membership_catalog_service;
pub mod proration_service;
pub mod purchase_service;
pub mod subscription_service;
pub mod transaction_ledger_service;

pub use membership_catalog_service::*;
pub use proration_service::*;
pub use purchase_service::*;
pub use subscription_service::*;
pub use transaction_ledger_service::*;
