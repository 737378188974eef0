//! Request and response bodies for the wallet backend

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `POST /auth/login`
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// `POST /auth/signup`
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub roles: Vec<String>,
}

impl SignupRequest {
    /// New regular user
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            username: username.into(),
            email: email.into(),
            password: password.into(),
            phone_number: phone_number.into(),
            roles: vec![DEFAULT_ROLE.to_string()],
        }
    }
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("phone_number", &self.phone_number)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Role given to self-registered users
pub const DEFAULT_ROLE: &str = "ROLE_USER";

/// Transaction type id for a wallet-to-wallet transfer
pub const TRANSFER_TYPE_ID: i64 = 1;

/// `POST /wallets/transfer`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub amount: Decimal,
    pub from_wallet_iban: String,
    pub to_wallet_iban: String,
    pub description: String,
    pub type_id: i64,
}

/// Error body returned by the backend on non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<ApiFieldError>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiFieldError {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Field errors if any, otherwise the top-level message
    pub fn messages(&self) -> Vec<String> {
        let field_messages: Vec<String> = self
            .errors
            .iter()
            .flatten()
            .filter_map(|e| e.message.clone())
            .collect();

        if !field_messages.is_empty() {
            return field_messages;
        }

        self.message.iter().cloned().collect()
    }
}

/// Paging parameters for collection endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    pub fn first(size: u32) -> Self {
        Self::new(0, size)
    }

    pub fn query(&self) -> [(&'static str, String); 2] {
        [("page", self.page.to_string()), ("size", self.size.to_string())]
    }
}
