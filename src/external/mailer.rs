use crate::config::MailConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SendMailRequest<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
}

/// Transactional mail over an HTTP API. Without `api_url` mails are only logged.
#[derive(Clone)]
pub struct MailerService {
    client: Client,
    config: MailConfig,
}

impl MailerService {
    pub fn new(config: MailConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build mail client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_url.is_empty()
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> AppResult<()> {
        if !self.is_configured() {
            log::info!("Mail not configured, skipping \"{subject}\" to {to}");
            return Ok(());
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&SendMailRequest {
                from: &self.config.from,
                to,
                subject,
                text,
            })
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Mail request failed: {e}")))?;

        if response.status().is_success() {
            log::info!("Mail \"{subject}\" sent to {to}");
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::InternalError(format!(
                "Mail sending failed: {error_text}"
            )))
        }
    }

    pub async fn send_purchase_confirmation(
        &self,
        to: &str,
        package_name: &str,
        valid_until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<()> {
        let until = valid_until
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "further notice".to_string());
        let text = format!(
            "Thank you for your purchase. Your {package_name} membership is active until {until}."
        );
        self.send(to, "Membership confirmed", &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_mailer_is_a_no_op() {
        let mailer = MailerService::new(MailConfig::default()).unwrap();
        assert!(!mailer.is_configured());
        mailer
            .send_purchase_confirmation("parent@example.com", "Premium", None)
            .await
            .unwrap();
    }
}
