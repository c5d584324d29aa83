use crate::entities::{BillingCycle, TransactionStatus, payment_transaction_entity as pt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransactionResponse {
    pub id: i32,
    pub package_id: i32,
    pub billing_cycle: BillingCycle,
    pub amount: i64,
    pub validity_days: i32,
    pub status: TransactionStatus,
    pub transaction_date: DateTime<Utc>,
    pub previous_package_name: Option<String>,
}

impl From<pt::Model> for PaymentTransactionResponse {
    fn from(m: pt::Model) -> Self {
        Self {
            id: m.id,
            package_id: m.package_id,
            billing_cycle: m.billing_cycle,
            amount: m.amount,
            validity_days: m.validity_days,
            status: m.status,
            transaction_date: m.transaction_date,
            previous_package_name: m.previous_package_name,
        }
    }
}

/// Admin view; keeps the identifiers needed to reconcile with the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaleTransactionResponse {
    pub id: i32,
    pub user_id: i32,
    pub package_id: i32,
    pub amount: i64,
    pub external_payment_id: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

impl From<pt::Model> for StaleTransactionResponse {
    fn from(m: pt::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            package_id: m.package_id,
            amount: m.amount,
            external_payment_id: m.external_payment_id,
            transaction_date: m.transaction_date,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub package_id: i32,
    pub payment_type: BillingCycle,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub approval_url: String,
    pub transaction_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Query string PayPal appends to the return URL.
#[derive(Debug, Deserialize)]
pub struct ExecutePaymentQuery {
    #[serde(rename = "paymentId")]
    pub payment_id: String,
    #[serde(rename = "PayerID", alias = "payerId")]
    pub payer_id: String,
    #[serde(rename = "packageId")]
    pub package_id: Option<i32>,
    #[serde(rename = "validityDays")]
    pub validity_days: Option<i32>,
}

/// Cancel redirect; PayPal adds the approval `token`.
#[derive(Debug, Deserialize)]
pub struct CancelPaymentQuery {
    #[serde(rename = "transactionId")]
    pub transaction_id: i32,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreePurchaseResponse {
    pub transaction_id: i32,
    pub membership: super::UserMembershipResponse,
}
