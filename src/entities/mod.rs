pub mod membership_packages;
pub mod package_permissions;
pub mod payment_transactions;
pub mod permissions;
pub mod user_memberships;
pub mod user_permissions;
pub mod users;

pub use membership_packages as membership_package_entity;
pub use package_permissions as package_permission_entity;
pub use payment_transactions as payment_transaction_entity;
pub use permissions as permission_entity;
pub use user_memberships as user_membership_entity;
pub use user_permissions as user_permission_entity;
pub use users as user_entity;

pub use membership_packages::PackageStatus;
pub use payment_transactions::{BillingCycle, TransactionStatus};
pub use user_memberships::MembershipStatus;
pub use users::UserRole;
