//! Payment provider port, an in-memory fake and the Stripe HTTP client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::metadata::SessionMetadata;

/// Everything needed to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    pub amount: Money,
    pub currency: String,
    pub product_name: String,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    /// Platform commission, only present for split payments.
    pub application_fee: Option<Money>,
    /// Connected account that receives the funds minus the fee.
    pub destination_account: Option<String>,
    pub metadata: SessionMetadata,
}

/// A session created by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page the traveler is redirected to.
    pub url: String,
}

/// Trait for creating hosted checkout sessions.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> Result<CheckoutSession, ProviderError>;
}

/// How the in-memory provider should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailure {
    Declined,
    Timeout,
}

#[derive(Debug, Default)]
struct InMemoryProviderState {
    sessions: Vec<(CheckoutSession, CheckoutSessionParams)>,
    next_id: u32,
    failure: Option<ProviderFailure>,
}

/// In-memory payment provider for testing and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<Mutex<InMemoryProviderState>>,
}

impl InMemoryPaymentProvider {
    /// Creates a new in-memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes subsequent calls fail until reset with `None`.
    pub fn set_failure(&self, failure: Option<ProviderFailure>) {
        self.lock().failure = failure;
    }

    /// Returns the number of sessions created.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Returns the parameters of the most recently created session.
    pub fn last_session(&self) -> Option<CheckoutSessionParams> {
        self.lock().sessions.last().map(|(_, params)| params.clone())
    }

    /// Returns the parameters a session was created with.
    pub fn session_params(&self, session_id: &str) -> Option<CheckoutSessionParams> {
        self.lock()
            .sessions
            .iter()
            .find(|(session, _)| session.id == session_id)
            .map(|(_, params)| params.clone())
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> Result<CheckoutSession, ProviderError> {
        let mut state = self.lock();

        match state.failure {
            Some(ProviderFailure::Declined) => {
                return Err(ProviderError::Api {
                    status: 402,
                    message: "Your card was declined.".to_string(),
                });
            }
            Some(ProviderFailure::Timeout) => return Err(ProviderError::Timeout),
            None => {}
        }

        state.next_id += 1;
        let id = format!("cs_test_{:06}", state.next_id);
        let session = CheckoutSession {
            url: format!("https://checkout.example.com/pay/{id}"),
            id,
        };
        state.sessions.push((session.clone(), params));
        Ok(session)
    }
}

/// Default Stripe API base URL.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Stripe Checkout client.
///
/// Sessions are created with destination charges: the application fee and
/// the connected account ride on `payment_intent_data`.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Creates a client with a per-request timeout.
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    /// Form fields for `POST /v1/checkout/sessions`.
    pub fn form_fields(params: &CheckoutSessionParams) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), params.success_url.clone()),
            ("cancel_url".to_string(), params.cancel_url.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                params.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                params.amount.minor().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                params.product_name.clone(),
            ),
        ];

        if let Some(email) = &params.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }
        if let (Some(fee), Some(account)) = (params.application_fee, &params.destination_account) {
            form.push((
                "payment_intent_data[application_fee_amount]".to_string(),
                fee.minor().to_string(),
            ));
            form.push((
                "payment_intent_data[transfer_data][destination]".to_string(),
                account.clone(),
            ));
        }
        for (key, value) in params.metadata.iter() {
            form.push((format!("metadata[{key}]"), value.to_string()));
        }
        form
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[tracing::instrument(skip(self, params), fields(amount = params.amount.minor()))]
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> Result<CheckoutSession, ProviderError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&Self::form_fields(&params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            tracing::warn!(status = status.as_u16(), %message, "Stripe rejected checkout session");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: StripeSession = response.json().await?;
        let url = session.url.ok_or_else(|| ProviderError::Api {
            status: status.as_u16(),
            message: format!("session {} has no redirect url", session.id),
        })?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CheckoutSessionParams {
        let mut metadata = SessionMetadata::new();
        metadata.insert("kind", "booking");
        CheckoutSessionParams {
            amount: Money::from_minor(149_900),
            currency: "eur".to_string(),
            product_name: "Salar de Uyuni".to_string(),
            customer_email: Some("ana@example.com".to_string()),
            success_url: "https://agency.example/ok".to_string(),
            cancel_url: "https://agency.example/cancel".to_string(),
            application_fee: Some(Money::from_minor(4497)),
            destination_account: Some("acct_1".to_string()),
            metadata,
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn form_carries_split_and_metadata() {
        let form = StripeClient::form_fields(&params());
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("149900"));
        assert_eq!(field(&form, "payment_intent_data[application_fee_amount]"), Some("4497"));
        assert_eq!(
            field(&form, "payment_intent_data[transfer_data][destination]"),
            Some("acct_1")
        );
        assert_eq!(field(&form, "metadata[kind]"), Some("booking"));
    }

    #[test]
    fn form_without_split_settles_to_platform() {
        let mut params = params();
        params.application_fee = None;
        params.destination_account = None;
        let form = StripeClient::form_fields(&params);
        assert!(field(&form, "payment_intent_data[application_fee_amount]").is_none());
        assert!(field(&form, "payment_intent_data[transfer_data][destination]").is_none());
    }

    #[tokio::test]
    async fn in_memory_provider_records_and_fails() {
        let provider = InMemoryPaymentProvider::new();
        let session = provider.create_checkout_session(params()).await.unwrap();
        assert_eq!(session.id, "cs_test_000001");
        assert_eq!(provider.session_params(&session.id), Some(params()));

        provider.set_failure(Some(ProviderFailure::Timeout));
        let err = provider.create_checkout_session(params()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout));
        assert_eq!(provider.session_count(), 1);
    }
}
