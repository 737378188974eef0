//! Pre-submit form validation
//!
//! Every violation is collected and reported on its own. A form with any
//! violation is never submitted, not even partially.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::ledger::amount::{parse_amount_str, InvalidAmount};

use super::types::{SignupRequest, TransferRequest, TRANSFER_TYPE_ID};

/// Signup field limits, in characters
pub const SIGNUP_FIELD_LIMITS: [(&str, usize); 5] = [
    ("username", 20),
    ("phoneNumber", 20),
    ("firstName", 50),
    ("lastName", 50),
    ("email", 50),
];

/// Longest IBAN any country issues
pub const MAX_IBAN_LEN: usize = 34;

pub const MAX_DESCRIPTION_LEN: usize = 100;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();
static PHONE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex")
    })
}

fn phone_pattern() -> &'static Regex {
    PHONE_PATTERN.get_or_init(|| {
        Regex::new(r"^[+]?[(]?[0-9]{1,4}[)]?[-\s.]?[0-9]{1,3}[-\s.]?[0-9]{4,10}$")
            .expect("Invalid phone regex")
    })
}

/// What is wrong with a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Required,
    TooLong { max: usize },
    InvalidFormat,
    NotANumber,
    NotPositive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Wire name of the field
    pub field: &'static str,
    pub kind: ViolationKind,
}

impl FieldViolation {
    fn new(field: &'static str, kind: ViolationKind) -> Self {
        Self { field, kind }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::Required => write!(f, "{} is required", self.field),
            ViolationKind::TooLong { max } => {
                write!(f, "{} must be {} characters or less", self.field, max)
            }
            ViolationKind::InvalidFormat => write!(f, "{} has an invalid format", self.field),
            ViolationKind::NotANumber => write!(f, "{} must be a number", self.field),
            ViolationKind::NotPositive => write!(f, "{} must be greater than zero", self.field),
        }
    }
}

/// All violations found in one form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldViolation> {
        self.0.iter()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    fn push(&mut self, field: &'static str, kind: ViolationKind) {
        self.0.push(FieldViolation::new(field, kind));
    }

    fn require(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.push(field, ViolationKind::Required);
            false
        } else {
            true
        }
    }

    fn limit(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(field, ViolationKind::TooLong { max });
        }
    }

    fn into_result<T>(self, ok: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(ok)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Check a signup form before it is sent
pub fn validate_signup(request: &SignupRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let fields = [
        ("username", request.username.as_str()),
        ("phoneNumber", request.phone_number.as_str()),
        ("firstName", request.first_name.as_str()),
        ("lastName", request.last_name.as_str()),
        ("email", request.email.as_str()),
    ];

    for (&(field, value), &(_, max)) in fields.iter().zip(SIGNUP_FIELD_LIMITS.iter()) {
        if errors.require(field, value) {
            errors.limit(field, value, max);
        }
    }
    errors.require("password", &request.password);

    if !request.email.is_empty() && !email_pattern().is_match(&request.email) {
        errors.push("email", ViolationKind::InvalidFormat);
    }
    if !request.phone_number.is_empty() && !phone_pattern().is_match(&request.phone_number) {
        errors.push("phoneNumber", ViolationKind::InvalidFormat);
    }

    errors.into_result(())
}

/// Raw transfer form input
#[derive(Debug, Clone, Default)]
pub struct TransferForm {
    pub amount: String,
    pub from_wallet_iban: String,
    pub to_wallet_iban: String,
    pub description: String,
}

impl TransferForm {
    /// Validate and turn into a request body
    pub fn validate(&self) -> Result<TransferRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let amount = if errors.require("amount", &self.amount) {
            match parse_amount_str(&self.amount) {
                Ok(amount) if amount > Decimal::ZERO => Some(amount),
                Ok(_) | Err(InvalidAmount::Negative(_)) => {
                    errors.push("amount", ViolationKind::NotPositive);
                    None
                }
                Err(_) => {
                    errors.push("amount", ViolationKind::NotANumber);
                    None
                }
            }
        } else {
            None
        };

        if errors.require("fromWalletIban", &self.from_wallet_iban) {
            errors.limit("fromWalletIban", self.from_wallet_iban.trim(), MAX_IBAN_LEN);
        }
        if errors.require("toWalletIban", &self.to_wallet_iban) {
            errors.limit("toWalletIban", self.to_wallet_iban.trim(), MAX_IBAN_LEN);
        }
        if errors.require("description", &self.description) {
            errors.limit("description", &self.description, MAX_DESCRIPTION_LEN);
        }

        match amount {
            Some(amount) if errors.is_empty() => Ok(TransferRequest {
                amount,
                from_wallet_iban: self.from_wallet_iban.trim().to_string(),
                to_wallet_iban: self.to_wallet_iban.trim().to_string(),
                description: self.description.clone(),
                type_id: TRANSFER_TYPE_ID,
            }),
            _ => Err(errors),
        }
    }
}
