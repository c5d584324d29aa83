use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub paypal: PayPalConfig,
    #[serde(default)]
    pub membership: MembershipConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_paypal_base_url")]
    pub base_url: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
    /// Public base URL of this API, used to build PayPal return/cancel URLs.
    pub return_base_url: String,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
}

/// Which period the remaining value of an old membership is spread over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePeriodPolicyKind {
    /// Prices above the threshold are treated as yearly prices.
    PriceThreshold,
    /// Use the billing cycle recorded on the membership.
    BillingCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipConfig {
    #[serde(default = "default_pending_window_hours")]
    pub pending_window_hours: i64,
    #[serde(default = "default_reference_period_policy")]
    pub reference_period_policy: ReferencePeriodPolicyKind,
    #[serde(default = "default_yearly_price_threshold_cents")]
    pub yearly_price_threshold_cents: i64,
    /// 0 disables the background sweep.
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_mail_from")]
    pub from: String,
    #[serde(default = "default_mail_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_paypal_base_url() -> String {
    "https://api-m.sandbox.paypal.com".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    15
}

fn default_pending_window_hours() -> i64 {
    24
}

fn default_reference_period_policy() -> ReferencePeriodPolicyKind {
    ReferencePeriodPolicyKind::PriceThreshold
}

fn default_yearly_price_threshold_cents() -> i64 {
    10_000
}

fn default_expiry_sweep_interval_secs() -> u64 {
    3600
}

fn default_mail_from() -> String {
    "no-reply@kidcare.local".to_string()
}

fn default_mail_timeout_secs() -> u64 {
    10
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            pending_window_hours: default_pending_window_hours(),
            reference_period_policy: default_reference_period_policy(),
            yearly_price_threshold_cents: default_yearly_price_threshold_cents(),
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            from: default_mail_from(),
            timeout_secs: default_mail_timeout_secs(),
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // without a config file everything comes from the environment
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_defaults()?,
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Cannot read config file {config_path}: {e}"
                )));
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {e}")))
    }

    fn from_env_defaults() -> AppResult<Self> {
        let database_url = get_env("DATABASE_URL").ok_or_else(|| {
            AppError::ConfigError(
                "DATABASE_URL is not set and no config.toml was found".to_string(),
            )
        })?;

        let return_base_url =
            get_env("PAYPAL_RETURN_BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string());

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET").unwrap_or_else(|| "change-me-in-production".to_string()),
                access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
            },
            paypal: PayPalConfig {
                client_id: get_env("PAYPAL_CLIENT_ID").unwrap_or_default(),
                client_secret: get_env("PAYPAL_CLIENT_SECRET").unwrap_or_default(),
                base_url: get_env("PAYPAL_BASE_URL").unwrap_or_else(default_paypal_base_url),
                timeout_secs: get_env_parse("PAYPAL_TIMEOUT_SECS", default_gateway_timeout_secs()),
                success_redirect_url: get_env("PAYPAL_SUCCESS_REDIRECT_URL")
                    .unwrap_or_else(|| format!("{return_base_url}/payment/success")),
                failure_redirect_url: get_env("PAYPAL_FAILURE_REDIRECT_URL")
                    .unwrap_or_else(|| format!("{return_base_url}/payment/failed")),
                return_base_url,
            },
            membership: MembershipConfig::default(),
            mail: MailConfig::default(),
        })
    }

    // environment variables win even when a config file exists
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("PAYPAL_CLIENT_ID") {
            self.paypal.client_id = v;
        }
        if let Ok(v) = env::var("PAYPAL_CLIENT_SECRET") {
            self.paypal.client_secret = v;
        }
        if let Ok(v) = env::var("PAYPAL_BASE_URL") {
            self.paypal.base_url = v;
        }
        if let Ok(v) = env::var("PAYPAL_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            self.paypal.timeout_secs = n;
        }
        if let Ok(v) = env::var("PAYPAL_RETURN_BASE_URL") {
            self.paypal.return_base_url = v;
        }
        if let Ok(v) = env::var("PAYPAL_SUCCESS_REDIRECT_URL") {
            self.paypal.success_redirect_url = v;
        }
        if let Ok(v) = env::var("PAYPAL_FAILURE_REDIRECT_URL") {
            self.paypal.failure_redirect_url = v;
        }

        // Membership rules
        if let Ok(v) = env::var("MEMBERSHIP_PENDING_WINDOW_HOURS")
            && let Ok(n) = v.parse()
        {
            self.membership.pending_window_hours = n;
        }
        if let Ok(v) = env::var("MEMBERSHIP_REFERENCE_PERIOD_POLICY") {
            match v.as_str() {
                "price_threshold" => {
                    self.membership.reference_period_policy =
                        ReferencePeriodPolicyKind::PriceThreshold
                }
                "billing_cycle" => {
                    self.membership.reference_period_policy =
                        ReferencePeriodPolicyKind::BillingCycle
                }
                other => log::warn!("Ignoring unknown MEMBERSHIP_REFERENCE_PERIOD_POLICY: {other}"),
            }
        }
        if let Ok(v) = env::var("MEMBERSHIP_YEARLY_PRICE_THRESHOLD_CENTS")
            && let Ok(n) = v.parse()
        {
            self.membership.yearly_price_threshold_cents = n;
        }
        if let Ok(v) = env::var("MEMBERSHIP_EXPIRY_SWEEP_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            self.membership.expiry_sweep_interval_secs = n;
        }

        // Mail
        if let Ok(v) = env::var("MAIL_API_URL") {
            self.mail.api_url = v;
        }
        if let Ok(v) = env::var("MAIL_API_KEY") {
            self.mail.api_key = v;
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [database]
        url = "sqlite::memory:"
        max_connections = 1

        [jwt]
        secret = "secret"
        access_token_expires_in = 3600

        [paypal]
        client_id = "cid"
        client_secret = "csecret"
        return_base_url = "https://api.example.com"
        success_redirect_url = "https://app.example.com/ok"
        failure_redirect_url = "https://app.example.com/failed"
    "#;

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.paypal.base_url, "https://api-m.sandbox.paypal.com");
        assert_eq!(config.paypal.timeout_secs, 15);
        assert_eq!(config.membership.pending_window_hours, 24);
        assert_eq!(
            config.membership.reference_period_policy,
            ReferencePeriodPolicyKind::PriceThreshold
        );
        assert_eq!(config.membership.yearly_price_threshold_cents, 10_000);
        assert!(config.mail.api_url.is_empty());
    }

    #[test]
    fn test_membership_policy_is_configurable() {
        let text = format!(
            "{MINIMAL}\n[membership]\nreference_period_policy = \"billing_cycle\"\npending_window_hours = 12\n"
        );
        let config = Config::parse(&text).unwrap();
        assert_eq!(
            config.membership.reference_period_policy,
            ReferencePeriodPolicyKind::BillingCycle
        );
        assert_eq!(config.membership.pending_window_hours, 12);
        assert_eq!(config.membership.expiry_sweep_interval_secs, 3600);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::parse("[server\nhost=").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
