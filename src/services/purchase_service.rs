use crate::config::PayPalConfig;
use crate::entities::{
    BillingCycle, TransactionStatus, membership_package_entity as mp,
    payment_transaction_entity as pt, user_entity as users, user_membership_entity as um,
};
use crate::error::{AppError, AppResult};
use crate::external::{MailerService, PaymentGateway};
use crate::models::{
    ExecutePaymentQuery, FreePurchaseResponse, OrderQuote, PaymentTransactionResponse,
    PurchaseRequest, PurchaseResponse,
};
use crate::services::{
    MembershipCatalogService, ProrationService, SubscriptionService, TransactionLedgerService,
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use std::sync::Arc;

/// Where the gateway sends the payer back, and where we send them after that.
#[derive(Debug, Clone)]
pub struct PurchaseUrls {
    pub return_base_url: String,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
}

impl PurchaseUrls {
    pub fn from_config(config: &PayPalConfig) -> Self {
        Self {
            return_base_url: config.return_base_url.trim_end_matches('/').to_string(),
            success_redirect_url: config.success_redirect_url.clone(),
            failure_redirect_url: config.failure_redirect_url.clone(),
        }
    }

    pub fn return_url(&self, transaction: &pt::Model) -> String {
        format!(
            "{}/api/v1/payment/execute?packageId={}&validityDays={}",
            self.return_base_url, transaction.package_id, transaction.validity_days
        )
    }

    /// PayPal appends `token=<approval token>` to this URL.
    pub fn cancel_url(&self, transaction: &pt::Model) -> String {
        format!(
            "{}/api/v1/payment/cancel?transactionId={}",
            self.return_base_url, transaction.id
        )
    }
}

/// The `token` query parameter of a PayPal approval link.
pub fn approval_token(approval_link: &str) -> Option<String> {
    let url = reqwest::Url::parse(approval_link).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed {
        transaction: pt::Model,
        membership: um::Model,
    },
    /// The gateway answered but did not approve; nothing was written.
    NotApproved { external_id: String, state: String },
}

#[derive(Clone)]
pub struct PurchaseService {
    pool: DatabaseConnection,
    proration: ProrationService,
    ledger: TransactionLedgerService,
    gateway: Arc<dyn PaymentGateway>,
    mailer: MailerService,
    urls: PurchaseUrls,
}

fn order_description(package_name: &str, cycle: BillingCycle) -> String {
    format!("{package_name} membership, {cycle} billing")
}

impl PurchaseService {
    pub fn new(
        pool: DatabaseConnection,
        proration: ProrationService,
        ledger: TransactionLedgerService,
        gateway: Arc<dyn PaymentGateway>,
        mailer: MailerService,
        urls: PurchaseUrls,
    ) -> Self {
        Self {
            pool,
            proration,
            ledger,
            gateway,
            mailer,
            urls,
        }
    }

    pub fn urls(&self) -> &PurchaseUrls {
        &self.urls
    }

    pub async fn preview_order(
        &self,
        account_id: i32,
        package_id: i32,
        cycle: BillingCycle,
    ) -> AppResult<OrderQuote> {
        self.proration.compute_order(account_id, package_id, cycle).await
    }

    /// Quote, open (or reuse) a pending transaction and create the gateway order.
    pub async fn begin_purchase(
        &self,
        account_id: i32,
        req: PurchaseRequest,
    ) -> AppResult<PurchaseResponse> {
        // quote and pending check share the account lock
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        TransactionLedgerService::lock_account(&txn, account_id).await?;
        let package =
            ProrationService::load_orderable(&txn, req.package_id, req.payment_type).await?;
        let quote = self
            .proration
            .quote_for(&txn, account_id, &package, req.payment_type, now)
            .await?;
        let handle = self.ledger.open_pending(&txn, account_id, &quote, now).await?;
        txn.commit().await?;
        let transaction = handle.transaction;

        if handle.existing
            && let Some(approval_url) = transaction.approval_link.clone()
        {
            return Ok(PurchaseResponse {
                approval_url,
                transaction_id: transaction.id,
                message: Some("A pending payment for this package already exists".to_string()),
            });
        }

        let created = match self
            .gateway
            .create_order(
                transaction.amount,
                &order_description(&quote.package.name, transaction.billing_cycle),
                &self.urls.return_url(&transaction),
                &self.urls.cancel_url(&transaction),
            )
            .await
        {
            Ok(created) => created,
            // the order may exist at the gateway; leave pending so a retry picks it up
            Err(AppError::GatewayTimeout(msg)) => return Err(AppError::GatewayTimeout(msg)),
            Err(e) => {
                if let Err(mark_err) = self.ledger.mark_failed(transaction.id).await {
                    log::error!(
                        "Failed to release transaction {} after gateway error: {mark_err}",
                        transaction.id
                    );
                }
                return Err(e);
            }
        };

        self.ledger
            .attach_external_payment(transaction.id, &created.external_id, &created.approval_url)
            .await?;

        log::info!(
            "Gateway order {} created for transaction {} (account {})",
            created.external_id,
            transaction.id,
            account_id
        );
        Ok(PurchaseResponse {
            approval_url: created.approval_url,
            transaction_id: transaction.id,
            message: None,
        })
    }

    /// Gateway callback after the payer approved. Settles the transaction and
    /// applies the membership in one database transaction.
    pub async fn execute_payment(&self, query: ExecutePaymentQuery) -> AppResult<ExecutionOutcome> {
        let recorded = self.ledger.find_by_external_id(&query.payment_id).await?;
        if recorded.status == TransactionStatus::Success {
            return Err(AppError::AlreadyProcessed(query.payment_id));
        }

        if query.package_id.is_some_and(|id| id != recorded.package_id)
            || query
                .validity_days
                .is_some_and(|days| days != recorded.validity_days)
        {
            log::warn!(
                "Return URL hints for {} differ from the recorded transaction {}; using recorded values",
                query.payment_id,
                recorded.id
            );
        }

        let executed = self
            .gateway
            .execute_order(&query.payment_id, &query.payer_id)
            .await?;
        if !executed.is_approved() {
            log::warn!(
                "Payment {} not approved by gateway (state={}); transaction {} left pending",
                executed.external_id,
                executed.state,
                recorded.id
            );
            return Ok(ExecutionOutcome::NotApproved {
                external_id: executed.external_id,
                state: executed.state,
            });
        }

        let (transaction, membership) = self.settle(&recorded).await?;

        self.notify_confirmation(transaction.user_id, transaction.package_id, membership.end_date);
        Ok(ExecutionOutcome::Completed {
            transaction,
            membership,
        })
    }

    async fn settle(&self, recorded: &pt::Model) -> AppResult<(pt::Model, um::Model)> {
        let external_id = recorded.external_payment_id.clone().unwrap_or_default();
        let on_persist_error = |e: AppError| match e {
            AppError::DatabaseError(db_err) => {
                log::error!(
                    "Payment captured but not applied: external_id={} account={} package={} error={}",
                    external_id,
                    recorded.user_id,
                    recorded.package_id,
                    db_err
                );
                AppError::PersistenceError(format!("payment {external_id}: {db_err}"))
            }
            other => other,
        };

        let now = Utc::now();
        let txn = self
            .pool
            .begin()
            .await
            .map_err(|e| on_persist_error(e.into()))?;

        let applied = async {
            let settled = TransactionLedgerService::mark_success(&txn, &external_id).await?;
            let membership = SubscriptionService::apply_purchase(
                &txn,
                settled.user_id,
                settled.package_id,
                settled.validity_days,
                &settled,
                now,
            )
            .await?;
            Ok::<_, AppError>((settled, membership))
        }
        .await;

        let (settled, membership) = match applied {
            Ok(applied) => applied,
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    log::error!("Rollback of payment {external_id} failed: {rollback_err}");
                }
                return Err(on_persist_error(e));
            }
        };
        txn.commit().await.map_err(|e| on_persist_error(e.into()))?;

        log::info!(
            "Payment {} settled: transaction={} membership={} account={}",
            external_id,
            settled.id,
            membership.id,
            settled.user_id
        );
        Ok((settled, membership))
    }

    /// Zero-payment path for free packages, sharing the quote logic of the paid flow.
    pub async fn purchase_free(
        &self,
        account_id: i32,
        package_id: i32,
    ) -> AppResult<FreePurchaseResponse> {
        let package =
            MembershipCatalogService::load_active_package(&self.pool, package_id).await?;
        if !package.is_free() {
            return Err(AppError::InvalidRequest(
                "Package is not free; use the payment flow".to_string(),
            ));
        }

        let now = Utc::now();
        let txn = self.pool.begin().await?;
        TransactionLedgerService::lock_account(&txn, account_id).await?;

        let quote = self
            .proration
            .quote_for(&txn, account_id, &package, BillingCycle::Monthly, now)
            .await?;
        let transaction =
            TransactionLedgerService::record_free_purchase(&txn, account_id, &quote).await?;
        let membership = SubscriptionService::apply_purchase(
            &txn,
            account_id,
            package.id,
            quote.validity_days,
            &transaction,
            now,
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Free package {} granted to account {} (transaction {})",
            package.id,
            account_id,
            transaction.id
        );
        self.notify_confirmation(account_id, package.id, membership.end_date);
        Ok(FreePurchaseResponse {
            transaction_id: transaction.id,
            membership: membership.into(),
        })
    }

    /// Payer abandoned the gateway page. Only the holder of the approval
    /// token PayPal hands back on the cancel redirect may cancel.
    pub async fn cancel_payment(
        &self,
        transaction_id: i32,
        token: Option<&str>,
    ) -> AppResult<pt::Model> {
        let transaction = self.ledger.find_by_id(transaction_id).await?;
        let expected = transaction.approval_link.as_deref().and_then(approval_token);
        match (expected.as_deref(), token) {
            (Some(expected), Some(given)) if expected == given => {}
            _ => {
                log::warn!("Cancel of transaction {transaction_id} rejected: token mismatch");
                return Err(AppError::Forbidden);
            }
        }
        self.ledger.mark_failed(transaction_id).await
    }

    pub async fn transactions(&self, account_id: i32) -> AppResult<Vec<PaymentTransactionResponse>> {
        self.ledger.list_for_account(account_id).await
    }

    fn notify_confirmation(
        &self,
        account_id: i32,
        package_id: i32,
        valid_until: Option<chrono::DateTime<Utc>>,
    ) {
        if !self.mailer.is_configured() {
            return;
        }
        let pool = self.pool.clone();
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let user = match users::Entity::find_by_id(account_id).one(&pool).await {
                Ok(Some(user)) => user,
                Ok(None) => return,
                Err(e) => {
                    log::warn!("Confirmation mail skipped for account {account_id}: {e}");
                    return;
                }
            };
            let package_name = mp::Entity::find_by_id(package_id)
                .one(&pool)
                .await
                .ok()
                .flatten()
                .map(|p| p.name)
                .unwrap_or_default();
            if let Err(e) = mailer
                .send_purchase_confirmation(&user.email, &package_name, valid_until)
                .await
            {
                log::warn!("Confirmation mail to account {account_id} failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction() -> pt::Model {
        let now = Utc::now();
        pt::Model {
            id: 42,
            user_id: 7,
            package_id: 3,
            billing_cycle: BillingCycle::Yearly,
            amount: 10_000,
            validity_days: 372,
            external_payment_id: None,
            status: TransactionStatus::Pending,
            transaction_date: now,
            approval_link: None,
            previous_package_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_return_and_cancel_urls() {
        let urls = PurchaseUrls {
            return_base_url: "https://api.example.com".to_string(),
            success_redirect_url: String::new(),
            failure_redirect_url: String::new(),
        };
        let tx = transaction();
        assert_eq!(
            urls.return_url(&tx),
            "https://api.example.com/api/v1/payment/execute?packageId=3&validityDays=372"
        );
        assert_eq!(
            urls.cancel_url(&tx),
            "https://api.example.com/api/v1/payment/cancel?transactionId=42"
        );
    }

    #[test]
    fn test_approval_token_is_read_from_link() {
        assert_eq!(
            approval_token(
                "https://www.sandbox.paypal.com/cgi-bin/webscr?cmd=_express-checkout&token=EC-60385559L1062554J"
            )
            .as_deref(),
            Some("EC-60385559L1062554J")
        );
        assert_eq!(approval_token("https://www.paypal.com/checkout"), None);
        assert_eq!(approval_token("not a url"), None);
    }

    #[test]
    fn test_trailing_slash_is_trimmed_from_base_url() {
        let config = PayPalConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            base_url: "https://api-m.sandbox.paypal.com".to_string(),
            timeout_secs: 5,
            return_base_url: "https://api.example.com/".to_string(),
            success_redirect_url: "https://app.example.com/ok".to_string(),
            failure_redirect_url: "https://app.example.com/fail".to_string(),
        };
        let urls = PurchaseUrls::from_config(&config);
        assert_eq!(urls.return_base_url, "https://api.example.com");
    }
}
