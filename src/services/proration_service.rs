//! Order quoting and proration.
//!
//! Every path that needs to know "how many days does this purchase buy" goes
//! through [`ProrationCalculator`]: the paid order preview, the purchase
//! initiation, and the free-package path. The calculator itself is pure; the
//! service wraps it with the lookups it needs.

use crate::config::{MembershipConfig, ReferencePeriodPolicyKind};
use crate::entities::{
    BillingCycle, membership_package_entity as mp, user_entity as users,
    user_membership_entity as um,
};
use crate::error::{AppError, AppResult};
use crate::models::{MembershipPackageResponse, OrderQuote};
use crate::services::{MembershipCatalogService, SubscriptionService};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait};

/// How the remaining value of an old membership is spread over days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePeriodPolicy {
    /// A snapshot price above `threshold_cents` is read as a yearly price (365
    /// days), anything else as monthly (30 days).
    PriceThreshold { threshold_cents: i64 },
    /// Use the billing cycle recorded on the membership.
    BillingCycle,
}

impl ReferencePeriodPolicy {
    pub fn from_config(config: &MembershipConfig) -> Self {
        match config.reference_period_policy {
            ReferencePeriodPolicyKind::PriceThreshold => ReferencePeriodPolicy::PriceThreshold {
                threshold_cents: config.yearly_price_threshold_cents,
            },
            ReferencePeriodPolicyKind::BillingCycle => ReferencePeriodPolicy::BillingCycle,
        }
    }

    pub fn reference_days(&self, membership: &um::Model) -> i64 {
        match self {
            ReferencePeriodPolicy::PriceThreshold { threshold_cents } => {
                if membership.price_at_purchase > *threshold_cents {
                    365
                } else {
                    30
                }
            }
            ReferencePeriodPolicy::BillingCycle => match membership.billing_cycle {
                BillingCycle::Yearly => 365,
                BillingCycle::Monthly => 30,
            },
        }
    }
}

impl Default for ReferencePeriodPolicy {
    fn default() -> Self {
        ReferencePeriodPolicy::PriceThreshold {
            threshold_cents: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proration {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub validity_days: i32,
    pub additional_days: i32,
    pub remaining_value: i64,
    pub is_renewal: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProrationCalculator {
    policy: ReferencePeriodPolicy,
}

fn clamp_days(days: i64) -> i32 {
    days.clamp(0, i32::MAX as i64) as i32
}

impl ProrationCalculator {
    pub fn new(policy: ReferencePeriodPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReferencePeriodPolicy {
        self.policy
    }

    /// `active` must be the caller's currently active membership, if any.
    pub fn prorate(
        &self,
        target: &mp::Model,
        cycle: BillingCycle,
        active: Option<&um::Model>,
        now: DateTime<Utc>,
    ) -> Proration {
        let base_days = target.base_validity_days(cycle) as i64;

        match active {
            Some(current) if current.package_id == target.id => {
                // renewal: the new term starts where the old one ends
                let start_date = current.end_date.filter(|end| *end > now).unwrap_or(now);
                let renewal_days = target.validity_period as i64;
                Proration {
                    start_date,
                    end_date: start_date + Duration::days(renewal_days),
                    validity_days: clamp_days(renewal_days),
                    additional_days: 0,
                    remaining_value: 0,
                    is_renewal: true,
                }
            }
            Some(current) => {
                let remaining_days = current
                    .end_date
                    .map(|end| (end - now).num_days().max(0))
                    .unwrap_or(0);
                let reference_days = self.policy.reference_days(current);
                let old_price = current.price_at_purchase.max(0);
                let new_price = target.price_for(cycle);

                let credit = remaining_days as i128 * old_price as i128;
                let remaining_value = (credit / reference_days as i128) as i64;
                // floor((credit / reference) / (new_price / base_days)) without float error
                let additional_days = if new_price > 0 {
                    (credit * base_days as i128 / (reference_days as i128 * new_price as i128))
                        as i64
                } else {
                    0
                };

                let validity_days = base_days + additional_days.max(0);
                Proration {
                    start_date: now,
                    end_date: now + Duration::days(validity_days),
                    validity_days: clamp_days(validity_days),
                    additional_days: clamp_days(additional_days),
                    remaining_value,
                    is_renewal: false,
                }
            }
            None => Proration {
                start_date: now,
                end_date: now + Duration::days(base_days),
                validity_days: clamp_days(base_days),
                additional_days: 0,
                remaining_value: 0,
                is_renewal: false,
            },
        }
    }
}

/// Paid orders need a non-zero amount for the chosen cycle.
pub fn check_orderable(package: &mp::Model, cycle: BillingCycle) -> AppResult<()> {
    if package.is_free() {
        return Err(AppError::InvalidRequest(
            "FreePackageNotOrderable".to_string(),
        ));
    }
    if package.price_for(cycle) <= 0 {
        return Err(AppError::InvalidRequest(format!(
            "Package {} has no {cycle} price",
            package.id
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ProrationService {
    pool: DatabaseConnection,
    calculator: ProrationCalculator,
}

impl ProrationService {
    pub fn new(pool: DatabaseConnection, calculator: ProrationCalculator) -> Self {
        Self { pool, calculator }
    }

    /// Quote for the paid purchase flow. Free packages are rejected here.
    pub async fn compute_order(
        &self,
        account_id: i32,
        package_id: i32,
        cycle: BillingCycle,
    ) -> AppResult<OrderQuote> {
        let package = Self::load_orderable(&self.pool, package_id, cycle).await?;
        self.quote_for(&self.pool, account_id, &package, cycle, Utc::now())
            .await
    }

    /// An active package with a positive price for `cycle`.
    pub async fn load_orderable<C: ConnectionTrait>(
        db: &C,
        package_id: i32,
        cycle: BillingCycle,
    ) -> AppResult<mp::Model> {
        let package = MembershipCatalogService::load_active_package(db, package_id).await?;
        check_orderable(&package, cycle)?;
        Ok(package)
    }

    /// Quote against an already loaded package on the given connection, so
    /// callers inside a database transaction see their own locks.
    pub async fn quote_for<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: i32,
        package: &mp::Model,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> AppResult<OrderQuote> {
        users::Entity::find_by_id(account_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let active = SubscriptionService::find_active(db, account_id, now).await?;
        let previous_package_name = match &active {
            Some(current) => mp::Entity::find_by_id(current.package_id)
                .one(db)
                .await?
                .map(|p| p.name)
                .unwrap_or_default(),
            None => String::new(),
        };

        let proration = self.calculator.prorate(package, cycle, active.as_ref(), now);
        let permissions = MembershipCatalogService::package_permissions(db, package.id).await?;

        Ok(OrderQuote {
            package: MembershipPackageResponse::from_model(package.clone(), permissions),
            payment_type: cycle,
            amount_due: package.price_for(cycle),
            start_date: proration.start_date,
            end_date: proration.end_date,
            validity_days: proration.validity_days,
            additional_days: proration.additional_days,
            remaining_value: proration.remaining_value,
            previous_package_name,
            is_renewal: proration.is_renewal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MembershipStatus, PackageStatus};

    fn package(id: i32, price: i64, yearly_price: i64, validity_period: i32) -> mp::Model {
        let now = Utc::now();
        mp::Model {
            id,
            name: format!("Package {id}"),
            description: None,
            price,
            yearly_price,
            validity_period,
            status: PackageStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn membership(
        package_id: i32,
        price_at_purchase: i64,
        cycle: BillingCycle,
        end_date: Option<DateTime<Utc>>,
    ) -> um::Model {
        let now = Utc::now();
        um::Model {
            id: 1,
            user_id: 1,
            package_id,
            start_date: now - Duration::days(15),
            end_date,
            status: MembershipStatus::Active,
            price_at_purchase,
            yearly_price_at_purchase: price_at_purchase * 10,
            billing_cycle: cycle,
            payment_transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_no_active_membership_gets_base_validity() {
        let now = Utc::now();
        let calc = ProrationCalculator::default();
        let p = calc.prorate(&package(2, 2000, 20_000, 30), BillingCycle::Monthly, None, now);
        assert_eq!(p.validity_days, 30);
        assert_eq!(p.additional_days, 0);
        assert_eq!(p.end_date, now + Duration::days(30));
        assert!(!p.is_renewal);
    }

    #[test]
    fn test_yearly_cycle_uses_365_days() {
        let now = Utc::now();
        let calc = ProrationCalculator::default();
        let p = calc.prorate(&package(2, 2000, 20_000, 30), BillingCycle::Yearly, None, now);
        assert_eq!(p.validity_days, 365);
    }

    #[test]
    fn test_switch_carries_over_remaining_value() {
        // 15 days left of a 10.00/30d package, switching to 20.00/30d:
        // floor((15 * 10/30) / (20/30)) = floor(7.5) = 7
        let now = Utc::now();
        let calc = ProrationCalculator::default();
        let active = membership(
            1,
            1000,
            BillingCycle::Monthly,
            Some(now + Duration::days(15) + Duration::hours(1)),
        );
        let p = calc.prorate(
            &package(2, 2000, 20_000, 30),
            BillingCycle::Monthly,
            Some(&active),
            now,
        );
        assert_eq!(p.additional_days, 7);
        assert_eq!(p.validity_days, 37);
        assert_eq!(p.remaining_value, 500);
        assert_eq!(p.start_date, now);
        assert!(!p.is_renewal);
    }

    #[test]
    fn test_price_threshold_treats_expensive_snapshot_as_yearly() {
        // 120.00 exceeds the 100.00 threshold, so the credit is spread over 365 days
        let now = Utc::now();
        let calc = ProrationCalculator::default();
        let active = membership(
            1,
            12_000,
            BillingCycle::Monthly,
            Some(now + Duration::days(73) + Duration::hours(1)),
        );
        let p = calc.prorate(
            &package(2, 2000, 20_000, 30),
            BillingCycle::Monthly,
            Some(&active),
            now,
        );
        // 73 * 12000 / 365 = 2400 cents; 2400 / (2000/30) = 36 days
        assert_eq!(p.remaining_value, 2400);
        assert_eq!(p.additional_days, 36);
    }

    #[test]
    fn test_billing_cycle_policy_ignores_price() {
        let now = Utc::now();
        let calc = ProrationCalculator::new(ReferencePeriodPolicy::BillingCycle);
        let active = membership(
            1,
            12_000,
            BillingCycle::Monthly,
            Some(now + Duration::days(15) + Duration::hours(1)),
        );
        let p = calc.prorate(
            &package(2, 2000, 20_000, 30),
            BillingCycle::Monthly,
            Some(&active),
            now,
        );
        // 15 * 12000 / 30 = 6000 cents; 6000 / (2000/30) = 90 days
        assert_eq!(p.additional_days, 90);
        assert_eq!(p.validity_days, 120);
    }

    #[test]
    fn test_same_package_is_a_renewal_from_old_end_date() {
        let now = Utc::now();
        let end = now + Duration::days(10);
        let calc = ProrationCalculator::default();
        let active = membership(1, 1000, BillingCycle::Monthly, Some(end));
        let p = calc.prorate(
            &package(1, 1000, 10_000, 30),
            BillingCycle::Monthly,
            Some(&active),
            now,
        );
        assert!(p.is_renewal);
        assert_eq!(p.additional_days, 0);
        assert_eq!(p.start_date, end);
        assert_eq!(p.end_date, end + Duration::days(30));
    }

    #[test]
    fn test_unbounded_active_membership_gives_no_credit() {
        let now = Utc::now();
        let calc = ProrationCalculator::default();
        let active = membership(1, 1000, BillingCycle::Monthly, None);
        let p = calc.prorate(
            &package(2, 2000, 20_000, 30),
            BillingCycle::Monthly,
            Some(&active),
            now,
        );
        assert_eq!(p.additional_days, 0);
        assert_eq!(p.validity_days, 30);
    }

    #[test]
    fn test_zero_priced_cycle_is_not_orderable() {
        let monthly_only = package(2, 2000, 0, 30);
        let err = check_orderable(&monthly_only, BillingCycle::Yearly).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(ref m) if m.contains("yearly")));
        assert!(check_orderable(&monthly_only, BillingCycle::Monthly).is_ok());

        let yearly_only = package(3, 0, 10_000, 30);
        assert!(check_orderable(&yearly_only, BillingCycle::Monthly).is_err());
        assert!(check_orderable(&yearly_only, BillingCycle::Yearly).is_ok());
    }

    #[test]
    fn test_free_package_is_rejected_before_cycle_check() {
        let err = check_orderable(&package(4, 0, 0, 30), BillingCycle::Monthly).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(ref m) if m == "FreePackageNotOrderable"));
    }
}
