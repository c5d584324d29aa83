use crate::config::PayPalConfig;
use crate::error::{AppError, AppResult};
use crate::external::{CreatedOrder, ExecutedOrder, PaymentGateway};
use crate::utils::format_amount;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLink {
    pub href: String,
    pub rel: String,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentResource {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub links: Vec<PaymentLink>,
}

impl PaymentResource {
    pub fn approval_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approval_url")
            .map(|l| l.href.as_str())
    }
}

#[derive(Debug, Serialize)]
struct ExecutePaymentRequest<'a> {
    payer_id: &'a str,
}

/// PayPal REST v1 payments client.
#[derive(Clone)]
pub struct PayPalService {
    client: Client,
    config: PayPalConfig,
    token: Arc<Mutex<Option<(String, DateTime<Utc>)>>>,
}

fn gateway_error(context: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::GatewayTimeout(format!("{context}: {e}"))
    } else {
        AppError::GatewayError(format!("{context}: {e}"))
    }
}

impl PayPalService {
    pub fn new(config: PayPalConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build PayPal client: {e}")))?;
        Ok(Self {
            client,
            config,
            token: Arc::new(Mutex::new(None)),
        })
    }

    async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires_at)) = cached.as_ref()
            && *expires_at > Utc::now()
        {
            return Ok(token.clone());
        }

        let url = format!("{}/v1/oauth2/token", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| gateway_error("PayPal authentication failed", e))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::GatewayError(format!(
                "PayPal authentication failed: {error_text}"
            )));
        }

        let body: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| gateway_error("Invalid PayPal token response", e))?;
        // refresh a minute early
        let expires_at = Utc::now() + Duration::seconds((body.expires_in - 60).max(0));
        *cached = Some((body.access_token.clone(), expires_at));
        Ok(body.access_token)
    }

    async fn read_payment(response: reqwest::Response, context: &str) -> AppResult<PaymentResource> {
        if response.status().is_success() {
            response
                .json::<PaymentResource>()
                .await
                .map_err(|e| gateway_error(context, e))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::GatewayError(format!("{context}: {error_text}")))
        }
    }
}

#[async_trait]
impl PaymentGateway for PayPalService {
    async fn create_order(
        &self,
        amount_cents: i64,
        description: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> AppResult<CreatedOrder> {
        let token = self.access_token().await?;
        let url = format!("{}/v1/payments/payment", self.config.base_url);
        let body = json!({
            "intent": "sale",
            "payer": { "payment_method": "paypal" },
            "transactions": [{
                "amount": {
                    "total": format_amount(amount_cents),
                    "currency": "USD"
                },
                "description": description
            }],
            "redirect_urls": {
                "return_url": return_url,
                "cancel_url": cancel_url
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("PayPal-Request-Id", uuid::Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| gateway_error("PayPal payment creation failed", e))?;

        let payment = Self::read_payment(response, "PayPal payment creation failed").await?;
        let approval_url = payment
            .approval_url()
            .ok_or_else(|| {
                AppError::GatewayError("PayPal response has no approval_url link".to_string())
            })?
            .to_string();

        log::info!("PayPal payment {} created ({})", payment.id, payment.state);
        Ok(CreatedOrder {
            external_id: payment.id,
            approval_url,
        })
    }

    async fn execute_order(&self, external_id: &str, payer_id: &str) -> AppResult<ExecutedOrder> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v1/payments/payment/{}/execute",
            self.config.base_url, external_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&ExecutePaymentRequest { payer_id })
            .send()
            .await
            .map_err(|e| gateway_error("PayPal payment execution failed", e))?;

        let payment = Self::read_payment(response, "PayPal payment execution failed").await?;
        log::info!("PayPal payment {} executed with state {}", payment.id, payment.state);
        Ok(ExecutedOrder {
            external_id: payment.id,
            state: payment.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_url_is_picked_from_links() {
        let payment: PaymentResource = serde_json::from_value(json!({
            "id": "PAYID-123",
            "state": "created",
            "links": [
                {"href": "https://api/self", "rel": "self", "method": "GET"},
                {"href": "https://paypal/approve?token=EC-1", "rel": "approval_url", "method": "REDIRECT"},
                {"href": "https://api/execute", "rel": "execute", "method": "POST"}
            ]
        }))
        .unwrap();
        assert_eq!(
            payment.approval_url(),
            Some("https://paypal/approve?token=EC-1")
        );
    }

    #[test]
    fn test_only_approved_state_counts_as_success() {
        let approved = ExecutedOrder {
            external_id: "P".into(),
            state: "approved".into(),
        };
        let failed = ExecutedOrder {
            external_id: "P".into(),
            state: "failed".into(),
        };
        assert!(approved.is_approved());
        assert!(!failed.is_approved());
    }
}
