//! Wallet backend API
//!
//! Wire types, pre-submit validation and the HTTP client.

pub mod client;
pub mod types;
pub mod validation;

pub use client::{classify_failure, BackendClient};
pub use types::{ApiErrorBody, LoginRequest, PageRequest, SignupRequest, TransferRequest};
pub use validation::{validate_signup, FieldViolation, TransferForm, ValidationErrors, ViolationKind};
