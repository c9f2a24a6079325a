//! reqwest-backed gateway client.
//!
//! Timeouts on mutating calls are reported as `Indeterminate`: the provider
//! may have completed the operation, so the caller must reconcile (refetch by
//! the same receipt/payment ref) instead of assuming failure.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, instrument, warn};

use crate::config::GatewayConfig;
use crate::errors::ServiceError;

use super::{PaymentGateway, RemoteOrder, RemoteOrderStatus};

/// Wire shape for creating a remote order.
#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a Value,
}

/// Provider's order representation.
#[derive(Debug, Deserialize)]
struct RemoteOrderBody {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    amount: i64,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefundResponseBody {
    id: String,
}

/// Provider error envelope, kept for logging only. Its shape never crosses
/// the adapter boundary.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: Option<ProviderErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetails {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentGateway {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            key_id: cfg.key_id.clone(),
            key_secret: cfg.key_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn provider_reason(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ProviderErrorBody>().await {
            Ok(ProviderErrorBody {
                error: Some(details),
            }) => format!(
                "{} ({}): {}",
                status,
                details.code.unwrap_or_else(|| "unknown".to_string()),
                details
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            ),
            _ => format!("{}: unreadable provider error body", status),
        }
    }

    /// In-flight failures on calls that mutate provider state are
    /// indeterminate; only a definite HTTP response is a definite outcome.
    fn transport_error(err: reqwest::Error, operation: &str) -> ServiceError {
        if err.is_timeout() || err.is_connect() {
            ServiceError::Indeterminate(format!("{} did not complete: {}", operation, err))
        } else {
            ServiceError::ExternalServiceError(format!("{}: {}", operation, err))
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, metadata))]
    async fn create_remote_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        metadata: Value,
    ) -> Result<RemoteOrder, ServiceError> {
        let body = CreateOrderBody {
            amount: amount_minor,
            currency,
            receipt,
            notes: &metadata,
        };

        let response = self
            .client
            .post(self.url("orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "create remote order"))?;

        if !response.status().is_success() {
            let reason = Self::provider_reason(response).await;
            error!(reason = %reason, "Gateway rejected order creation");
            return Err(ServiceError::ExternalServiceError(format!(
                "order creation rejected: {}",
                reason
            )));
        }

        let remote: RemoteOrderBody = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        Ok(RemoteOrder {
            gateway_order_ref: remote.id,
            amount_minor: remote.amount,
            currency: remote.currency,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_order_status(
        &self,
        gateway_order_ref: &str,
    ) -> Result<RemoteOrderStatus, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("orders/{}", gateway_order_ref)))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("fetch order: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "gateway order {} not found",
                gateway_order_ref
            )));
        }
        if !response.status().is_success() {
            let reason = Self::provider_reason(response).await;
            return Err(ServiceError::ExternalServiceError(format!(
                "fetch order failed: {}",
                reason
            )));
        }

        let remote: RemoteOrderBody = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        Ok(match remote.status.as_deref() {
            Some("paid") => RemoteOrderStatus::Paid,
            Some("attempted") => RemoteOrderStatus::Attempted,
            _ => RemoteOrderStatus::Created,
        })
    }

    #[instrument(skip(self))]
    async fn refund(&self, payment_ref: &str, amount_minor: i64) -> Result<String, ServiceError> {
        // The payment ref doubles as the idempotent receipt: retrying a full
        // refund after an indeterminate outcome cannot double-refund.
        let body = RefundBody {
            amount: amount_minor,
            receipt: payment_ref,
        };

        let response = self
            .client
            .post(self.url(&format!("payments/{}/refund", payment_ref)))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "refund"))?;

        if !response.status().is_success() {
            let reason = Self::provider_reason(response).await;
            warn!(payment_ref = %payment_ref, reason = %reason, "Gateway declined refund");
            return Err(ServiceError::RefundFailed(reason));
        }

        let refund: RefundResponseBody = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        Ok(refund.id)
    }
}
