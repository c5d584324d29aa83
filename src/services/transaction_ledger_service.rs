use crate::entities::{
    TransactionStatus, payment_transaction_entity as pt, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{OrderQuote, PaymentTransactionResponse, StaleTransactionResponse};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// Result of [`TransactionLedgerService::begin_purchase`].
#[derive(Debug, Clone)]
pub struct PendingTransactionHandle {
    pub transaction: pt::Model,
    /// True when an identical pending purchase was returned instead of a new row.
    pub existing: bool,
}

/// A pending transaction older than the window no longer blocks new purchases.
/// It is never failed automatically.
pub fn is_stale(transaction: &pt::Model, now: DateTime<Utc>, window: Duration) -> bool {
    transaction.status == TransactionStatus::Pending && transaction.transaction_date + window <= now
}

#[derive(Clone)]
pub struct TransactionLedgerService {
    pool: DatabaseConnection,
    pending_window: Duration,
}

impl TransactionLedgerService {
    pub fn new(pool: DatabaseConnection, pending_window_hours: i64) -> Self {
        Self {
            pool,
            pending_window: Duration::hours(pending_window_hours),
        }
    }

    pub fn pending_window(&self) -> Duration {
        self.pending_window
    }

    /// Open a pending transaction for `quote`, or hand back the identical one
    /// already in flight. At most one live pending purchase per account.
    pub async fn begin_purchase(
        &self,
        account_id: i32,
        quote: &OrderQuote,
    ) -> AppResult<PendingTransactionHandle> {
        let txn = self.pool.begin().await?;
        Self::lock_account(&txn, account_id).await?;
        let handle = self.open_pending(&txn, account_id, quote, Utc::now()).await?;
        txn.commit().await?;
        Ok(handle)
    }

    /// Exclusive lock on the account row; serializes purchase attempts of one account.
    pub async fn lock_account<C: ConnectionTrait>(db: &C, account_id: i32) -> AppResult<()> {
        users::Entity::find_by_id(account_id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
        Ok(())
    }

    /// Reuse-or-insert step of [`Self::begin_purchase`]. The caller must hold
    /// the account lock on `db` and commit.
    pub async fn open_pending<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: i32,
        quote: &OrderQuote,
        now: DateTime<Utc>,
    ) -> AppResult<PendingTransactionHandle> {
        let latest = pt::Entity::find()
            .filter(pt::Column::UserId.eq(account_id))
            .filter(pt::Column::Status.eq(TransactionStatus::Pending))
            .order_by_desc(pt::Column::Id)
            .one(db)
            .await?;

        if let Some(pending) = latest.filter(|t| !is_stale(t, now, self.pending_window)) {
            if pending.package_id == quote.package.id
                && pending.billing_cycle == quote.payment_type
                && pending.amount == quote.amount_due
            {
                log::info!(
                    "Reusing pending transaction {} for account {}",
                    pending.id,
                    account_id
                );
                return Ok(PendingTransactionHandle {
                    transaction: pending,
                    existing: true,
                });
            }
            return Err(AppError::PendingTransactionExists(format!(
                "Transaction {} is still pending for another package or price",
                pending.id
            )));
        }

        let previous_package_name =
            Some(quote.previous_package_name.clone()).filter(|name| !name.is_empty());
        let created = pt::ActiveModel {
            user_id: Set(account_id),
            package_id: Set(quote.package.id),
            billing_cycle: Set(quote.payment_type),
            amount: Set(quote.amount_due),
            validity_days: Set(quote.validity_days),
            external_payment_id: Set(None),
            status: Set(TransactionStatus::Pending),
            transaction_date: Set(now),
            approval_link: Set(None),
            previous_package_name: Set(previous_package_name),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        log::info!(
            "Pending transaction {} opened: account={} package={} amount={}",
            created.id,
            account_id,
            created.package_id,
            created.amount
        );
        Ok(PendingTransactionHandle {
            transaction: created,
            existing: false,
        })
    }

    /// Record the gateway's identifiers on a transaction. Repeating the call
    /// with the same values changes nothing.
    pub async fn attach_external_payment(
        &self,
        transaction_id: i32,
        external_payment_id: &str,
        approval_link: &str,
    ) -> AppResult<pt::Model> {
        let current = pt::Entity::find_by_id(transaction_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;

        if current.external_payment_id.as_deref() == Some(external_payment_id)
            && current.approval_link.as_deref() == Some(approval_link)
        {
            return Ok(current);
        }
        if let Some(other) = current.external_payment_id.as_deref()
            && other != external_payment_id
        {
            return Err(AppError::InvalidRequest(format!(
                "Transaction {transaction_id} is already bound to another payment"
            )));
        }

        let mut am = current.into_active_model();
        am.external_payment_id = Set(Some(external_payment_id.to_string()));
        am.approval_link = Set(Some(approval_link.to_string()));
        am.updated_at = Set(Utc::now());
        Ok(am.update(&self.pool).await?)
    }

    /// Flip the transaction behind `external_payment_id` to success. Runs on the
    /// caller's connection so it commits together with the subscription update.
    pub async fn mark_success<C: ConnectionTrait>(
        db: &C,
        external_payment_id: &str,
    ) -> AppResult<pt::Model> {
        let current = pt::Entity::find()
            .filter(pt::Column::ExternalPaymentId.eq(external_payment_id))
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;

        match current.status {
            TransactionStatus::Success => {
                return Err(AppError::AlreadyProcessed(external_payment_id.to_string()));
            }
            TransactionStatus::Failed => log::warn!(
                "Transaction {} was marked failed but the gateway approved it; accepting",
                current.id
            ),
            TransactionStatus::Pending => {}
        }

        let mut am = current.into_active_model();
        am.status = Set(TransactionStatus::Success);
        am.updated_at = Set(Utc::now());
        Ok(am.update(db).await?)
    }

    /// Mark a pending transaction failed. Settled transactions are returned untouched.
    pub async fn mark_failed(&self, transaction_id: i32) -> AppResult<pt::Model> {
        let current = pt::Entity::find_by_id(transaction_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;
        if current.status != TransactionStatus::Pending {
            return Ok(current);
        }

        let mut am = current.into_active_model();
        am.status = Set(TransactionStatus::Failed);
        am.updated_at = Set(Utc::now());
        let updated = am.update(&self.pool).await?;
        log::info!("Transaction {} marked failed", updated.id);
        Ok(updated)
    }

    /// Zero-amount purchase that never touches the gateway; recorded as settled.
    pub async fn record_free_purchase<C: ConnectionTrait>(
        db: &C,
        account_id: i32,
        quote: &OrderQuote,
    ) -> AppResult<pt::Model> {
        let now = Utc::now();
        let previous_package_name =
            Some(quote.previous_package_name.clone()).filter(|name| !name.is_empty());
        let created = pt::ActiveModel {
            user_id: Set(account_id),
            package_id: Set(quote.package.id),
            billing_cycle: Set(quote.payment_type),
            amount: Set(0),
            validity_days: Set(quote.validity_days),
            external_payment_id: Set(None),
            status: Set(TransactionStatus::Success),
            transaction_date: Set(now),
            approval_link: Set(None),
            previous_package_name: Set(previous_package_name),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(created)
    }

    pub async fn find_by_id(&self, transaction_id: i32) -> AppResult<pt::Model> {
        pt::Entity::find_by_id(transaction_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))
    }

    pub async fn find_by_external_id(&self, external_payment_id: &str) -> AppResult<pt::Model> {
        pt::Entity::find()
            .filter(pt::Column::ExternalPaymentId.eq(external_payment_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))
    }

    /// 用户交易记录（新的在前）
    pub async fn list_for_account(
        &self,
        account_id: i32,
    ) -> AppResult<Vec<PaymentTransactionResponse>> {
        let list = pt::Entity::find()
            .filter(pt::Column::UserId.eq(account_id))
            .order_by_desc(pt::Column::TransactionDate)
            .order_by_desc(pt::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    /// Pending transactions that outlived the window, oldest first.
    pub async fn list_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<StaleTransactionResponse>> {
        let cutoff = now - self.pending_window;
        let list = pt::Entity::find()
            .filter(pt::Column::Status.eq(TransactionStatus::Pending))
            .filter(pt::Column::TransactionDate.lte(cutoff))
            .order_by_asc(pt::Column::TransactionDate)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BillingCycle;

    fn pending_at(transaction_date: DateTime<Utc>) -> pt::Model {
        pt::Model {
            id: 1,
            user_id: 1,
            package_id: 1,
            billing_cycle: BillingCycle::Monthly,
            amount: 1000,
            validity_days: 30,
            external_payment_id: None,
            status: TransactionStatus::Pending,
            transaction_date,
            approval_link: None,
            previous_package_name: None,
            created_at: transaction_date,
            updated_at: transaction_date,
        }
    }

    #[test]
    fn test_pending_within_window_is_live() {
        let now = Utc::now();
        let tx = pending_at(now - Duration::hours(23));
        assert!(!is_stale(&tx, now, Duration::hours(24)));
    }

    #[test]
    fn test_pending_past_window_is_stale() {
        let now = Utc::now();
        let tx = pending_at(now - Duration::hours(25));
        assert!(is_stale(&tx, now, Duration::hours(24)));
    }

    #[test]
    fn test_settled_transactions_are_never_stale() {
        let now = Utc::now();
        let mut tx = pending_at(now - Duration::days(3));
        tx.status = TransactionStatus::Success;
        assert!(!is_stale(&tx, now, Duration::hours(24)));
    }
}
