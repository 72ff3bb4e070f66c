//! The payment provider seam. Any provider is an opaque callback-delivering
//! service from the core's point of view; a fake provider (used in tests
//! and local development) and a real HTTP provider share this trait so the
//! dispatcher's call sites don't care which is wired up.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
pub struct PaymentHandle {
    pub payment_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentProviderError {
    #[error("payment provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("payment provider disabled")]
    Disabled,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn initiate_payment(
        &self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<PaymentHandle, PaymentProviderError>;
}

/// Calls the test-only `/_fake_payments` endpoint to obtain a payment id,
/// then after a short simulated processing delay, delivers a success/
/// failure webhook back to `/payments/callback` at `success_rate`. Mirrors
/// `original_source/app/workers/outbox_worker.py::_handle_order_created`.
///
/// The webhook is signed with the same `webhook_secret` the HTTP layer
/// verifies against (`webhook::verify_signature`), so this stand-in
/// provider exercises the exact signature-checking path a real provider
/// would have to satisfy.
pub struct FakePaymentProvider {
    client: reqwest::Client,
    base_url: String,
    enabled: bool,
    success_rate: Decimal,
    webhook_secret: String,
}

impl FakePaymentProvider {
    pub fn new(
        base_url: impl Into<String>,
        enabled: bool,
        success_rate: Decimal,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with static config"),
            base_url: base_url.into(),
            enabled,
            success_rate,
            webhook_secret: webhook_secret.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn initiate_payment(
        &self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<PaymentHandle, PaymentProviderError> {
        if !self.enabled {
            return Err(PaymentProviderError::Disabled);
        }

        #[derive(serde::Serialize)]
        struct FakePaymentRequest {
            order_id: String,
            amount: Decimal,
        }
        #[derive(serde::Deserialize)]
        struct FakePaymentResponse {
            payment_id: String,
        }

        let response: FakePaymentResponse = self
            .client
            .post(format!("{}/_fake_payments", self.base_url))
            .json(&FakePaymentRequest {
                order_id: order_id.to_string(),
                amount,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let payment_id = response.payment_id;
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let success_rate = self.success_rate;
        let webhook_secret = self.webhook_secret.clone();
        let order_id_str = order_id.to_string();
        let payment_id_for_callback = payment_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;

            let roll: f64 = rand::random();
            let succeeded = Decimal::try_from(roll).map(|r| r < success_rate).unwrap_or(false);
            let status = if succeeded { "success" } else { "failed" };

            #[derive(serde::Serialize)]
            struct Webhook<'a> {
                payment_id: &'a str,
                order_id: &'a str,
                status: &'a str,
            }

            let body = match serde_json::to_vec(&Webhook {
                payment_id: &payment_id_for_callback,
                order_id: &order_id_str,
                status,
            }) {
                Ok(body) => body,
                Err(_) => return,
            };

            let mut mac = match HmacSha256::new_from_slice(webhook_secret.as_bytes()) {
                Ok(mac) => mac,
                Err(_) => return,
            };
            mac.update(&body);
            let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

            let _ = client
                .post(format!("{base_url}/payments/callback"))
                .header("x-payment-signature", signature)
                .header("content-type", "application/json")
                .body(body)
                .send()
                .await;
        });

        Ok(PaymentHandle { payment_id })
    }
}

pub type SharedPaymentProvider = Arc<dyn PaymentProvider>;
