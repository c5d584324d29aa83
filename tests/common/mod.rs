#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kidcare_backend::config::{MailConfig, PayPalConfig};
use kidcare_backend::entities::{
    BillingCycle, MembershipStatus, PackageStatus, UserRole, membership_package_entity as mp,
    package_permission_entity as pp, permission_entity as perm, user_entity as users,
    user_membership_entity as um,
};
use kidcare_backend::error::{AppError, AppResult};
use kidcare_backend::external::{CreatedOrder, ExecutedOrder, MailerService, PaymentGateway};
use kidcare_backend::services::*;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub async fn setup_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    // one connection keeps the in-memory database alive and shared
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// In-process stand-in for PayPal.
#[derive(Default)]
pub struct FakeGateway {
    pub create_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    execute_state: Mutex<Option<String>>,
    create_error: Mutex<Option<AppError>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_execute_state(&self, state: &str) {
        *self.execute_state.lock().unwrap() = Some(state.to_string());
    }

    pub fn fail_next_create(&self, err: AppError) {
        *self.create_error.lock().unwrap() = Some(err);
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        _amount_cents: i64,
        _description: &str,
        _return_url: &str,
        _cancel_url: &str,
    ) -> AppResult<CreatedOrder> {
        if let Some(err) = self.create_error.lock().unwrap().take() {
            return Err(err);
        }
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CreatedOrder {
            external_id: format!("PAY-{n}"),
            approval_url: approval_url(n),
        })
    }

    async fn execute_order(&self, external_id: &str, _payer_id: &str) -> AppResult<ExecutedOrder> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let state = self
            .execute_state
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "approved".to_string());
        Ok(ExecutedOrder {
            external_id: external_id.to_string(),
            state,
        })
    }
}

/// Approval link of the `n`th order, carrying the token PayPal echoes on cancel.
pub fn approval_url(n: usize) -> String {
    format!("https://paypal.test/checkout?token=EC-{n}")
}

pub fn paypal_config() -> PayPalConfig {
    PayPalConfig {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 1,
        return_base_url: "https://api.kidcare.test".to_string(),
        success_redirect_url: "https://app.kidcare.test/payment/success".to_string(),
        failure_redirect_url: "https://app.kidcare.test/payment/failure".to_string(),
    }
}

pub struct Services {
    pub catalog: MembershipCatalogService,
    pub proration: ProrationService,
    pub ledger: TransactionLedgerService,
    pub subscriptions: SubscriptionService,
    pub purchase: PurchaseService,
}

pub fn build_services(db: &DatabaseConnection, gateway: Arc<FakeGateway>) -> Services {
    let proration = ProrationService::new(db.clone(), ProrationCalculator::default());
    let ledger = TransactionLedgerService::new(db.clone(), 24);
    let mailer = MailerService::new(MailConfig::default()).unwrap();
    let purchase = PurchaseService::new(
        db.clone(),
        proration.clone(),
        ledger.clone(),
        gateway,
        mailer,
        PurchaseUrls::from_config(&paypal_config()),
    );
    Services {
        catalog: MembershipCatalogService::new(db.clone()),
        proration,
        ledger,
        subscriptions: SubscriptionService::new(db.clone()),
        purchase,
    }
}

pub async fn seed_user(db: &DatabaseConnection, email: &str, role: UserRole) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        email: Set(email.to_string()),
        full_name: Set("Test Parent".to_string()),
        role: Set(role),
        membership_package_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_package(
    db: &DatabaseConnection,
    name: &str,
    price: i64,
    yearly_price: i64,
    validity_period: i32,
) -> mp::Model {
    let now = Utc::now();
    mp::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        yearly_price: Set(yearly_price),
        validity_period: Set(validity_period),
        status: Set(PackageStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_permission(db: &DatabaseConnection, name: &str) -> perm::Model {
    perm::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn grant_permission(db: &DatabaseConnection, package_id: i32, permission_id: i32) {
    pp::ActiveModel {
        package_id: Set(package_id),
        permission_id: Set(permission_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn deactivate_package(db: &DatabaseConnection, package: &mp::Model) {
    let mut am: mp::ActiveModel = package.clone().into();
    am.status = Set(PackageStatus::Inactive);
    am.update(db).await.unwrap();
}

/// Active membership ending `days_left` days (plus an hour of slack) from now.
pub async fn seed_active_membership(
    db: &DatabaseConnection,
    user_id: i32,
    package: &mp::Model,
    days_left: i64,
) -> um::Model {
    let now = Utc::now();
    let end: DateTime<Utc> = now + Duration::days(days_left) + Duration::hours(1);
    um::ActiveModel {
        user_id: Set(user_id),
        package_id: Set(package.id),
        start_date: Set(now - Duration::days(15)),
        end_date: Set(Some(end)),
        status: Set(MembershipStatus::Active),
        price_at_purchase: Set(package.price),
        yearly_price_at_purchase: Set(package.yearly_price),
        billing_cycle: Set(BillingCycle::Monthly),
        payment_transaction_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
