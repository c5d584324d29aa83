use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use kidcare_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{MailerService, PayPalService, PaymentGateway},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::{JwtService, TokenVerifier},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);
    let verifier: Arc<dyn TokenVerifier> = Arc::new(jwt_service);

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        PayPalService::new(config.paypal.clone()).expect("Failed to create PayPal client"),
    );
    let mailer = MailerService::new(config.mail.clone()).expect("Failed to create mail client");
    if !mailer.is_configured() {
        log::warn!("Mail API not configured; confirmation emails will be skipped");
    }

    let calculator =
        ProrationCalculator::new(ReferencePeriodPolicy::from_config(&config.membership));
    let catalog_service = MembershipCatalogService::new(pool.clone());
    let proration_service = ProrationService::new(pool.clone(), calculator);
    let ledger_service =
        TransactionLedgerService::new(pool.clone(), config.membership.pending_window_hours);
    let subscription_service = SubscriptionService::new(pool.clone());
    let purchase_service = PurchaseService::new(
        pool.clone(),
        proration_service,
        ledger_service.clone(),
        gateway,
        mailer,
        PurchaseUrls::from_config(&config.paypal),
    );

    tasks::spawn_all(
        subscription_service.clone(),
        config.membership.expiry_sweep_interval_secs,
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(verifier.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(catalog_service.clone()))
            .app_data(web::Data::new(ledger_service.clone()))
            .app_data(web::Data::new(subscription_service.clone()))
            .app_data(web::Data::new(purchase_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::membership_config)
                    .configure(handlers::purchase_config)
                    .configure(handlers::payment_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
