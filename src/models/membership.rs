use crate::entities::{
    BillingCycle, MembershipStatus, membership_package_entity as mp, permission_entity as perm,
    user_membership_entity as um,
};
use crate::utils::discount_percent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

impl From<perm::Model> for PermissionResponse {
    fn from(m: perm::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
        }
    }
}

/// Catalog entry as shown to customers; prices in cents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPackageResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub yearly_price: i64,
    pub validity_period: i32,
    pub discount_percent: i32,
    pub permissions: Vec<PermissionResponse>,
}

impl MembershipPackageResponse {
    pub fn from_model(m: mp::Model, permissions: Vec<perm::Model>) -> Self {
        Self {
            discount_percent: discount_percent(m.price, m.yearly_price),
            id: m.id,
            name: m.name,
            description: m.description,
            price: m.price,
            yearly_price: m.yearly_price,
            validity_period: m.validity_period,
            permissions: permissions.into_iter().map(PermissionResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    #[serde(default = "default_payment_type")]
    pub payment_type: BillingCycle,
}

fn default_payment_type() -> BillingCycle {
    BillingCycle::Monthly
}

/// Priced offer for one package and billing cycle, including carried-over days.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub package: MembershipPackageResponse,
    pub payment_type: BillingCycle,
    /// cents
    pub amount_due: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub validity_days: i32,
    pub additional_days: i32,
    /// cents, rounded down
    pub remaining_value: i64,
    pub previous_package_name: String,
    pub is_renewal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserMembershipResponse {
    pub id: i32,
    pub package_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: MembershipStatus,
    pub price_at_purchase: i64,
    pub yearly_price_at_purchase: i64,
    pub billing_cycle: BillingCycle,
    pub payment_transaction_id: Option<i32>,
}

impl From<um::Model> for UserMembershipResponse {
    fn from(m: um::Model) -> Self {
        Self {
            id: m.id,
            package_id: m.package_id,
            start_date: m.start_date,
            end_date: m.end_date,
            status: m.status,
            price_at_purchase: m.price_at_purchase,
            yearly_price_at_purchase: m.yearly_price_at_purchase,
            billing_cycle: m.billing_cycle,
            payment_transaction_id: m.payment_transaction_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMembershipResponse {
    pub membership: UserMembershipResponse,
    pub package_name: String,
    pub permissions: Vec<PermissionResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplacePackagePermissionsRequest {
    pub permission_ids: Vec<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpireMembershipsResponse {
    pub expired_count: u64,
}
