//! Wallet backend HTTP client
//!
//! Thin wrapper over the backend's REST API. Requests carry the bearer
//! token of the current session when there is one. No retries: a failed
//! call is reported once and the caller decides how to degrade.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::ledger::dashboard::LedgerSource;
use crate::ledger::types::WalletRecord;
use crate::session::types::{Session, UserId};

use super::types::{ApiErrorBody, LoginRequest, PageRequest, SignupRequest, TransferRequest};
use super::validation::validate_signup;

/// Wallet backend client
pub struct BackendClient {
    client: Client,
    base_url: Url,
    authorization: Option<String>,
}

impl BackendClient {
    /// Create an unauthenticated client
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid api.base_url {}: {}", config.base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "api.base_url cannot be used as a base: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            authorization: None,
        })
    }

    /// Attach the bearer token of `session` to subsequent requests
    pub fn with_session(mut self, session: Option<&Session>) -> Self {
        self.authorization = session.and_then(Session::authorization);
        self
    }

    /// Build an endpoint URL below the base, percent-encoding each segment
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("api.base_url cannot be used as a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.authorization {
            Some(header) => request.header(reqwest::header::AUTHORIZATION, header),
            None => {
                warn!("No session token, sending request without credentials");
                request
            }
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "Backend request failed");
            return Err(classify_failure(status, &body));
        }

        debug!(%url, status = status.as_u16(), bytes = body.len(), "Backend request succeeded");

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Deserialization(format!("Invalid JSON from {}: {}", url, e)))
    }

    async fn get(&self, url: Url) -> Result<Value> {
        self.execute(self.authenticated(self.client.get(url))).await
    }

    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B, with_auth: bool) -> Result<Value> {
        let request = self.client.post(url).json(body);
        let request = if with_auth {
            self.authenticated(request)
        } else {
            request
        };
        self.execute(request).await
    }

    /// Exchange credentials for a session. The caller stores it.
    pub async fn login(&self, request: &LoginRequest) -> Result<Session> {
        let url = self.endpoint(&["auth", "login"])?;
        let value = self.post(url, request, false).await.map_err(|e| match e {
            Error::Unauthorized => Error::Api {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                messages: vec!["Invalid username or password".to_string()],
            },
            other => other,
        })?;

        let session: Session = serde_json::from_value(value)
            .map_err(|e| Error::Deserialization(format!("Unexpected login response: {}", e)))?;

        info!(user_id = %session.id, username = %session.username, "Logged in");
        Ok(session)
    }

    /// Register a new user. Nothing is sent unless every field is valid.
    pub async fn signup(&self, request: &SignupRequest) -> Result<Value> {
        validate_signup(request)?;

        let url = self.endpoint(&["auth", "signup"])?;
        let value = self.post(url, request, false).await?;

        info!(username = %request.username, "Signed up");
        Ok(value)
    }

    /// All wallets owned by `user_id`, undecoded
    pub async fn wallets_by_user(&self, user_id: UserId) -> Result<Value> {
        let url = self.endpoint(&["wallets", "users", &user_id.to_string()])?;
        self.get(url).await
    }

    /// Look up a wallet (and its owner) by IBAN
    pub async fn wallet_by_iban(&self, iban: &str) -> Result<WalletRecord> {
        let url = self.endpoint(&["wallets", "iban", iban])?;
        let value = self.get(url).await.map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("IBAN {}", iban)),
            other => other,
        })?;

        let record = unwrap_data(value);
        if !record.is_object() {
            return Err(Error::Deserialization(format!(
                "Expected wallet object for IBAN {}",
                iban
            )));
        }

        serde_json::from_value(record)
            .map_err(|e| Error::Deserialization(format!("Invalid wallet for IBAN {}: {}", iban, e)))
    }

    /// Move funds between wallets
    pub async fn transfer(&self, request: &TransferRequest) -> Result<Value> {
        let url = self.endpoint(&["wallets", "transfer"])?;
        let value = self.post(url, request, true).await?;

        info!(
            amount = %request.amount,
            from = %request.from_wallet_iban,
            to = %request.to_wallet_iban,
            "Transfer submitted"
        );
        Ok(value)
    }

    /// One page of `user_id`'s transaction history, undecoded
    pub async fn transactions_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Value> {
        let mut url = self.endpoint(&["transactions", "users", &user_id.to_string()])?;
        url.query_pairs_mut().extend_pairs(page.query());
        self.get(url).await
    }
}

#[async_trait]
impl LedgerSource for BackendClient {
    async fn wallets_by_user(&self, user_id: UserId) -> Result<Value> {
        BackendClient::wallets_by_user(self, user_id).await
    }

    async fn transactions_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Value> {
        BackendClient::transactions_by_user(self, user_id, page).await
    }
}

/// Some endpoints wrap their payload as `{ "data": ... }`
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Map a non-2xx response to an error.
///
/// 401 is kept apart from everything else: it means the session has to be
/// renewed rather than the request fixed.
pub fn classify_failure(status: StatusCode, body: &str) -> Error {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let mut messages = parsed.messages();

    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::NOT_FOUND => Error::NotFound(
            messages
                .pop()
                .unwrap_or_else(|| "resource not found".to_string()),
        ),
        _ => {
            if messages.is_empty() {
                messages.push(
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string(),
                );
            }
            Error::Api {
                status: status.as_u16(),
                messages,
            }
        }
    }
}
