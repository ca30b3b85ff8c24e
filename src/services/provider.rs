use crate::{config::PaymentConfig, errors::ServiceError};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, instrument};

type HmacSha256 = Hmac<Sha256>;

/// Status the provider reports for a payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderPaymentStatus {
    Pending,
    Paid,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutItem {
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_code: i64,
    pub amount: Decimal,
    pub description: String,
    pub items: Vec<CheckoutItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub payment_link_id: Option<String>,
}

/// Hosted-checkout provider seam. The production client talks HTTP; tests
/// substitute [`StaticProvider`].
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_payment_link(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ServiceError>;

    async fn payment_status(
        &self,
        order_code: i64,
    ) -> Result<ProviderPaymentStatus, ServiceError>;
}

/// HTTP client for the hosted-checkout provider. Requests are signed with
/// HMAC-SHA256 over the alphabetically-ordered core fields using the
/// merchant checksum key; calls are bounded by the configured timeout.
pub struct HostedCheckoutClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    api_key: String,
    checksum_key: String,
    return_url: String,
    cancel_url: String,
}

impl HostedCheckoutClient {
    pub fn new(config: &PaymentConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            api_key: config.api_key.clone(),
            checksum_key: config.checksum_key.clone(),
            return_url: config.return_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }

    fn sign(&self, request: &CheckoutRequest) -> Result<String, ServiceError> {
        // amount, cancelUrl, description, orderCode, returnUrl in
        // alphabetical order per the provider contract.
        let payload = format!(
            "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
            request.amount, self.cancel_url, request.description, request.order_code,
            self.return_url
        );
        let mut mac = HmacSha256::new_from_slice(self.checksum_key.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("invalid checksum key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl CheckoutProvider for HostedCheckoutClient {
    #[instrument(skip(self, request), fields(order_code = request.order_code))]
    async fn create_payment_link(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let signature = self.sign(request)?;
        let body = serde_json::json!({
            "orderCode": request.order_code,
            "amount": request.amount,
            "description": request.description,
            "items": request.items,
            "returnUrl": self.return_url,
            "cancelUrl": self.cancel_url,
            "signature": signature,
        });

        let response = self
            .http
            .post(format!("{}/v2/payment-requests", self.base_url))
            .header("x-client-id", &self.client_id)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "payment link request failed");
                ServiceError::ExternalServiceError(format!("payment provider unreachable: {e}"))
            })?;

        let payload: Value = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid provider response: {e}"))
        })?;

        let code = payload.get("code").and_then(Value::as_str).unwrap_or("");
        if code != "00" {
            let desc = payload
                .get("desc")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider error");
            return Err(ServiceError::ExternalServiceError(format!(
                "payment link rejected: {desc}"
            )));
        }

        let data = payload.get("data").cloned().unwrap_or(Value::Null);
        let checkout_url = data
            .get("checkoutUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(
                    "provider response missing checkoutUrl".to_string(),
                )
            })?
            .to_string();
        let payment_link_id = data
            .get("paymentLinkId")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(CheckoutSession {
            checkout_url,
            payment_link_id,
        })
    }

    #[instrument(skip(self))]
    async fn payment_status(
        &self,
        order_code: i64,
    ) -> Result<ProviderPaymentStatus, ServiceError> {
        let response = self
            .http
            .get(format!(
                "{}/v2/payment-requests/{order_code}",
                self.base_url
            ))
            .header("x-client-id", &self.client_id)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("payment provider unreachable: {e}"))
            })?;

        let payload: Value = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid provider response: {e}"))
        })?;

        let status = payload
            .get("data")
            .and_then(|d| d.get("status"))
            .and_then(Value::as_str)
            .unwrap_or("PENDING");

        Ok(match status {
            "PAID" => ProviderPaymentStatus::Paid,
            "CANCELLED" => ProviderPaymentStatus::Cancelled,
            "EXPIRED" => ProviderPaymentStatus::Expired,
            _ => ProviderPaymentStatus::Pending,
        })
    }
}

/// Canned provider used by tests and local development without
/// provider credentials.
pub struct StaticProvider {
    pub checkout_url: String,
    pub status: ProviderPaymentStatus,
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self {
            checkout_url: "https://checkout.example.test/session".to_string(),
            status: ProviderPaymentStatus::Pending,
        }
    }
}

#[async_trait]
impl CheckoutProvider for StaticProvider {
    async fn create_payment_link(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        Ok(CheckoutSession {
            checkout_url: format!("{}?orderCode={}", self.checkout_url, request.order_code),
            payment_link_id: Some(format!("link-{}", request.order_code)),
        })
    }

    async fn payment_status(&self, _order_code: i64) -> Result<ProviderPaymentStatus, ServiceError> {
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> PaymentConfig {
        PaymentConfig {
            base_url,
            client_id: "client-1".to_string(),
            api_key: "key-1".to_string(),
            checksum_key: "checksum-1".to_string(),
            ..PaymentConfig::default()
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            order_code: 123456789,
            amount: dec!(1250),
            description: "Order 123456789".to_string(),
            items: vec![CheckoutItem {
                name: "Vitamin C Serum".to_string(),
                quantity: 2,
                price: dec!(100),
            }],
        }
    }

    #[tokio::test]
    async fn create_payment_link_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/payment-requests"))
            .and(header("x-client-id", "client-1"))
            .and(header("x-api-key", "key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "00",
                "desc": "success",
                "data": {
                    "checkoutUrl": "https://pay.example/abc",
                    "paymentLinkId": "abc"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HostedCheckoutClient::new(&config(server.uri()));
        let session = client.create_payment_link(&request()).await.unwrap();
        assert_eq!(session.checkout_url, "https://pay.example/abc");
        assert_eq!(session.payment_link_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn provider_rejection_surfaces_as_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/payment-requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "231",
                "desc": "duplicate order code"
            })))
            .mount(&server)
            .await;

        let client = HostedCheckoutClient::new(&config(server.uri()));
        let err = client.create_payment_link(&request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
        assert!(err.to_string().contains("duplicate order code"));
    }

    #[tokio::test]
    async fn payment_status_maps_provider_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/payment-requests/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "00",
                "data": { "status": "PAID" }
            })))
            .mount(&server)
            .await;

        let client = HostedCheckoutClient::new(&config(server.uri()));
        let status = client.payment_status(42).await.unwrap();
        assert_eq!(status, ProviderPaymentStatus::Paid);
    }

    #[test]
    fn signature_is_stable_for_identical_input() {
        let cfg = config("https://api.example".to_string());
        let client = HostedCheckoutClient::new(&cfg);
        let a = client.sign(&request()).unwrap();
        let b = client.sign(&request()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
