use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;
use crate::logger::warn_if_slow;

/// Buyer contact details forwarded to the gateway on link creation.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BuyerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// One priced line item included on the gateway checkout page.
#[derive(Clone, Debug, Serialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: i64,
    pub price: i64,
}

/// `create_link` request shape. `description` is truncated by the
/// caller to the gateway's 25-character limit before this struct is built.
#[derive(Clone, Debug, Serialize)]
pub struct CreateLinkRequest {
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub items: Vec<LineItem>,
    pub return_url: String,
    pub cancel_url: String,
    pub buyer_info: BuyerInfo,
}

#[derive(Clone, Debug)]
pub struct CreateLinkResponse {
    pub checkout_url: String,
    pub qr_code: String,
    pub payment_link_id: String,
}

/// The external payment gateway collaborator. Out of scope beyond this
/// interface; `MockGateway` below is the in-process test double,
/// `HttpGateway` the production `reqwest` client.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_link(&self, req: CreateLinkRequest) -> Result<CreateLinkResponse, AppError>;

    /// Verifies `x-payos-signature` over the canonical (key-sorted,
    /// whitespace-free) JSON body. `body` is the raw bytes as received.
    fn verify_signature(&self, body: &[u8], signature_hex: &str) -> bool;
}

type HmacSha256 = Hmac<Sha256>;

/// Re-serializes a JSON value with its object keys sorted ascending at every
/// level: sorting the top-level keys of the body ascending and
/// serializing without extra whitespace.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Computes the hex-encoded HMAC-SHA256 of the canonical body, keyed by
/// `checksum_key`.
pub fn sign_canonical_body(checksum_key: &str, body: &serde_json::Value) -> anyhow::Result<String> {
    let canonical = canonicalize(body);
    let serialized = serde_json::to_vec(&canonical)?;
    let mut mac = HmacSha256::new_from_slice(checksum_key.as_bytes())?;
    mac.update(&serialized);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Production gateway client over `reqwest`, with a connect/request timeout
/// and an idle connection pool, JSON in and out.
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    api_key: String,
    checksum_key: String,
}

impl HttpGateway {
    pub fn new(
        base_url: String,
        client_id: String,
        api_key: String,
        checksum_key: String,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            client_id,
            api_key,
            checksum_key,
        })
    }
}

#[derive(Deserialize)]
struct CreateLinkEnvelope {
    data: CreateLinkData,
}

#[derive(Deserialize)]
struct CreateLinkData {
    #[serde(rename = "checkoutUrl")]
    checkout_url: String,
    #[serde(rename = "qrCode")]
    qr_code: String,
    #[serde(rename = "paymentLinkId")]
    payment_link_id: String,
}

impl HttpGateway {
    async fn send_create_link(
        &self,
        url: &str,
        req: &CreateLinkRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(url)
            .header("x-client-id", &self.client_id)
            .header("x-api-key", &self.api_key)
            .json(req)
            .send()
            .await
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    #[tracing::instrument(skip(self, req), fields(order_code = req.order_code))]
    async fn create_link(&self, req: CreateLinkRequest) -> Result<CreateLinkResponse, AppError> {
        let url = format!("{}/v2/payment-requests", self.base_url);

        let envelope: CreateLinkEnvelope = warn_if_slow(
            "gateway_create_link",
            Duration::from_millis(500),
            async {
                // "Gateway calls are retried once on transient network error,
                // never on signature/validation errors": only a connect/send
                // failure is retried, never a non-2xx response.
                let first = self.send_create_link(&url, &req).await;
                let resp = match first {
                    Ok(resp) => resp,
                    Err(e) if e.is_connect() || e.is_timeout() => {
                        tracing::warn!(error = %e, "gateway create_link transient failure, retrying once");
                        self.send_create_link(&url, &req)
                            .await
                            .map_err(|e| AppError::Gateway(e.to_string()))?
                    }
                    Err(e) => return Err(AppError::Gateway(e.to_string())),
                };

                resp.error_for_status()
                    .map_err(|e| AppError::Gateway(e.to_string()))?
                    .json()
                    .await
                    .map_err(|e| AppError::Gateway(e.to_string()))
            },
        )
        .await?;

        Ok(CreateLinkResponse {
            checkout_url: envelope.data.checkout_url,
            qr_code: envelope.data.qr_code,
            payment_link_id: envelope.data.payment_link_id,
        })
    }

    fn verify_signature(&self, body: &[u8], signature_hex: &str) -> bool {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
            return false;
        };
        let Ok(expected) = sign_canonical_body(&self.checksum_key, &value) else {
            return false;
        };
        constant_time_eq(expected.as_bytes(), signature_hex.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// In-process test double: deterministic, no network.
#[derive(Clone, Default)]
pub struct MockGateway {
    pub checksum_key: String,
}

impl MockGateway {
    pub fn new(checksum_key: impl Into<String>) -> Self {
        Self {
            checksum_key: checksum_key.into(),
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn create_link(&self, req: CreateLinkRequest) -> Result<CreateLinkResponse, AppError> {
        Ok(CreateLinkResponse {
            checkout_url: format!("https://pay.example.test/checkout/{}", req.order_code),
            qr_code: format!("qr:{}", req.order_code),
            payment_link_id: req.order_code.to_string(),
        })
    }

    fn verify_signature(&self, body: &[u8], signature_hex: &str) -> bool {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
            return false;
        };
        let Ok(expected) = sign_canonical_body(&self.checksum_key, &value) else {
            return false;
        };
        constant_time_eq(expected.as_bytes(), signature_hex.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_is_key_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        let sig_a = sign_canonical_body("secret", &a).unwrap();
        let sig_b = sign_canonical_body("secret", &b).unwrap();
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn mock_gateway_round_trips_its_own_signature() {
        let gw = MockGateway::new("secret");
        let body = serde_json::json!({"orderCode": 123, "code": "00"});
        let sig = sign_canonical_body("secret", &body).unwrap();
        let raw = serde_json::to_vec(&body).unwrap();
        assert!(gw.verify_signature(&raw, &sig));
    }

    #[test]
    fn mock_gateway_rejects_tampered_signature() {
        let gw = MockGateway::new("secret");
        let body = serde_json::json!({"orderCode": 123, "code": "00"});
        let raw = serde_json::to_vec(&body).unwrap();
        assert!(!gw.verify_signature(&raw, "deadbeef"));
    }
}
