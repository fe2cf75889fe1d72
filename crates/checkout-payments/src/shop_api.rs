//! Shop API Backend
//!
//! The storefront's own REST API: creates payment intents server-side and
//! records purchases.

use async_trait::async_trait;
use checkout_core::{
    IdempotencyKey, OrderPlacementBackend, PaymentIntent, PaymentIntentBackend,
    PaymentIntentRequest, Purchase,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Header carrying the attempt's idempotency key
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Deserialize)]
struct PaymentIntentResponse {
    client_secret: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseResponse {
    order_tracking_number: String,
}

/// Error bodies the shop API may return
#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for `{shop_api_url}/checkout/*`
#[derive(Clone, Debug)]
pub struct ShopApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ShopApiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B, key: &IdempotencyKey) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!(url = %url, "POST shop API");

        let response = self
            .http
            .post(&url)
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.message.or(b.error))
                .unwrap_or_else(|| {
                    if text.is_empty() {
                        status.canonical_reason().unwrap_or("request failed").to_string()
                    } else {
                        text
                    }
                });

            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentIntentBackend for ShopApiClient {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
        key: &IdempotencyKey,
    ) -> checkout_core::Result<PaymentIntent> {
        let response: PaymentIntentResponse =
            self.post("checkout/payment-intent", request, key).await?;

        Ok(PaymentIntent::from_client_secret(response.client_secret))
    }

    fn name(&self) -> &str {
        "shop-api"
    }
}

#[async_trait]
impl OrderPlacementBackend for ShopApiClient {
    async fn place_order(
        &self,
        purchase: &Purchase,
        key: &IdempotencyKey,
    ) -> checkout_core::Result<String> {
        let response: PurchaseResponse = self.post("checkout/purchase", purchase, key).await?;
        Ok(response.order_tracking_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{
        AddressForm, CartItem, CartSnapshot, CheckoutForm, CustomerInfo, Currency,
        IdempotencyKeys, Region,
    };
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> IdempotencyKey {
        IdempotencyKeys::new("secret", "session").derive(0, &request(), &[])
    }

    fn request() -> PaymentIntentRequest {
        PaymentIntentRequest {
            amount: 4599,
            currency: Currency::Eur,
            receipt_email: "jane.doe@example.com".into(),
        }
    }

    fn purchase() -> Purchase {
        let address = AddressForm {
            street: "1 Infinite Loop".into(),
            city: "Cupertino".into(),
            state: Region::new("CA", "California"),
            country: Region::new("US", "United States"),
            zip_code: "95014".into(),
        };
        let form = CheckoutForm {
            customer: CustomerInfo {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                email: "jane.doe@example.com".into(),
            },
            shipping_address: address.clone(),
            billing_address: address,
        };
        let cart = CartSnapshot::from_items(vec![CartItem {
            product_id: 1,
            name: "Coffee Mug".into(),
            image_url: None,
            unit_price: dec!(12.50),
            quantity: 2,
        }]);
        Purchase::from_form(&form, &cart).unwrap()
    }

    #[tokio::test]
    async fn test_create_intent() {
        let server = MockServer::start().await;
        let key = key();

        Mock::given(method("POST"))
            .and(path("/api/checkout/payment-intent"))
            .and(header(IDEMPOTENCY_HEADER, key.as_str()))
            .and(body_json(json!({
                "amount": 4599,
                "currency": "EUR",
                "receiptEmail": "jane.doe@example.com"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "client_secret": "pi_123_secret_abc" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ShopApiClient::new(reqwest::Client::new(), format!("{}/api/", server.uri()));
        let intent = client.create_intent(&request(), &key).await.unwrap();

        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret, "pi_123_secret_abc");
    }

    #[tokio::test]
    async fn test_place_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/checkout/purchase"))
            .and(body_partial_json(json!({
                "customer": { "email": "jane.doe@example.com" },
                "shippingAddress": { "state": "California", "country": "United States" },
                "order": { "totalQuantity": 2 }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "orderTrackingNumber": "TRK123" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ShopApiClient::new(reqwest::Client::new(), format!("{}/api", server.uri()));
        let tracking = client.place_order(&purchase(), &key()).await.unwrap();

        assert_eq!(tracking, "TRK123");
    }

    #[tokio::test]
    async fn test_error_body_message_surfaces() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/checkout/purchase"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({ "message": "database unavailable" })),
            )
            .mount(&server)
            .await;

        let client = ShopApiClient::new(reqwest::Client::new(), format!("{}/api", server.uri()));
        let err = client.post::<_, PurchaseResponse>("checkout/purchase", &purchase(), &key()).await;

        match err {
            Err(PaymentError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.order_tracking_number)),
        }
    }
}
