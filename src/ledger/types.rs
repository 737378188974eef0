//! Ledger records as served by the backend
//!
//! Records are decoded leniently: a field with an unexpected shape is
//! treated as missing rather than rejecting the whole record. Only payloads
//! that are not collections at all are reported as malformed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::session::types::UserId;

use super::amount::{parse_amount, InvalidAmount};

/// Decode a field, falling back to `None` when its shape is wrong
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// User reference nested inside a wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyUser {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<UserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub full_name: Option<String>,
}

impl PartyUser {
    /// "First Last", or the backend's full name when provided
    pub fn display_name(&self) -> String {
        if let Some(full) = self.full_name.as_deref().filter(|n| !n.is_empty()) {
            return full.to_string();
        }
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// One side (sender or receiver) of a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<PartyUser>,
    #[serde(default, deserialize_with = "lenient")]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub user_id: Option<UserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub iban: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

impl Party {
    /// Party identified by username only
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            user_name: Some(username.into()),
            ..Default::default()
        }
    }

    /// Party identified by owning user id only
    pub fn owned_by(user_id: i64) -> Self {
        Self {
            user_id: Some(UserId(user_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionType {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

/// A transaction snapshot, read-only for the duration of one report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<i64>,

    /// Raw amount; see [`Transaction::amount`]
    #[serde(default)]
    pub amount: Value,

    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,

    /// Raw timestamp; see [`Transaction::created_at_in`]
    #[serde(default)]
    pub created_at: Value,

    #[serde(default, deserialize_with = "lenient")]
    pub from_wallet: Option<Party>,

    #[serde(default, deserialize_with = "lenient")]
    pub to_wallet: Option<Party>,

    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub transaction_type: Option<TransactionType>,

    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

impl Transaction {
    /// Parsed, non-negative amount
    pub fn amount(&self) -> Result<Decimal, InvalidAmount> {
        parse_amount(&self.amount)
    }

    /// Creation instant in the viewer's time zone.
    ///
    /// Accepts RFC 3339, offset-less local date-times (interpreted in `tz`),
    /// bare dates (UTC midnight) and epoch milliseconds.
    pub fn created_at_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        parse_timestamp(&self.created_at, tz)
    }

    pub fn is_successful(&self) -> bool {
        self.status.as_deref() == Some("SUCCESS")
    }
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

fn parse_timestamp<Tz: TimeZone>(raw: &Value, tz: &Tz) -> Option<DateTime<Tz>> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(tz));
            }
            for format in NAIVE_FORMATS {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return tz.from_local_datetime(&naive).earliest();
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive).with_timezone(tz))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.with_timezone(tz)),
        _ => None,
    }
}

/// A wallet owned by the viewer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub iban: Option<String>,
    #[serde(default)]
    pub balance: Value,
    #[serde(default, deserialize_with = "lenient")]
    pub user_id: Option<UserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<PartyUser>,
}

impl WalletRecord {
    pub fn balance(&self) -> Result<Decimal, InvalidAmount> {
        parse_amount(&self.balance)
    }
}

/// One page of the transaction history
#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    pub content: Vec<Transaction>,
    pub total_elements: Option<u64>,
    pub total_pages: Option<u64>,
    /// Zero-based page index
    pub number: Option<u64>,
    /// Entries that were not objects and got dropped
    pub skipped: usize,
}

/// Payload was not the collection we asked for
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedPayload(pub String);

impl std::fmt::Display for MalformedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed payload: {}", self.0)
    }
}

impl std::error::Error for MalformedPayload {}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn decode_records<T: DeserializeOwned>(items: &[Value], kind: &str) -> (Vec<T>, usize) {
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                debug!(kind, error = %e, "Skipping undecodable record");
            }
        }
    }

    if skipped > 0 {
        warn!(kind, skipped, kept = records.len(), "Dropped malformed records");
    }

    (records, skipped)
}

/// Decode a paged transaction response (`{ "content": [...] }`)
pub fn decode_transaction_page(payload: Option<&Value>) -> Result<TransactionPage, MalformedPayload> {
    let payload = payload.ok_or_else(|| MalformedPayload("missing transaction page".into()))?;

    let content = payload
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            MalformedPayload(format!(
                "expected object with `content` array, got {}",
                describe(payload)
            ))
        })?;

    let (content, skipped) = decode_records::<Transaction>(content, "transaction");

    Ok(TransactionPage {
        content,
        total_elements: payload.get("totalElements").and_then(Value::as_u64),
        total_pages: payload.get("totalPages").and_then(Value::as_u64),
        number: payload.get("number").and_then(Value::as_u64),
        skipped,
    })
}

/// Decode a wallet list: a bare array, or an array under `data`
pub fn decode_wallets(payload: Option<&Value>) -> Result<Vec<WalletRecord>, MalformedPayload> {
    let payload = payload.ok_or_else(|| MalformedPayload("missing wallet list".into()))?;

    let items = payload
        .as_array()
        .or_else(|| payload.get("data").and_then(Value::as_array))
        .ok_or_else(|| {
            MalformedPayload(format!("expected wallet array, got {}", describe(payload)))
        })?;

    Ok(decode_records::<WalletRecord>(items, "wallet").0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decode_full_transaction() {
        let payload = json!({
            "content": [{
                "id": 11,
                "amount": 125.5,
                "description": "rent",
                "createdAt": "2024-05-01T10:20:30Z",
                "fromWallet": {"iban": "TR01", "user": {"id": 1, "username": "alice", "firstName": "Alice", "lastName": "Smith"}},
                "toWallet": {"userName": "bob", "userId": 2},
                "type": {"id": 1, "name": "Transfer"},
                "status": "SUCCESS"
            }],
            "totalElements": 1,
            "totalPages": 1,
            "number": 0
        });

        let page = decode_transaction_page(Some(&payload)).unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.total_elements, Some(1));

        let tx = &page.content[0];
        assert_eq!(tx.amount(), Ok(dec!(125.5)));
        assert!(tx.is_successful());
        let from = tx.from_wallet.as_ref().unwrap();
        assert_eq!(from.user.as_ref().unwrap().display_name(), "Alice Smith");
        assert_eq!(tx.to_wallet.as_ref().unwrap().user_id, Some(UserId(2)));
        assert_eq!(tx.transaction_type.as_ref().unwrap().name.as_deref(), Some("Transfer"));
    }

    #[test]
    fn test_odd_fields_become_missing() {
        let payload = json!({
            "content": [
                {"amount": "10", "fromWallet": "alice", "toWallet": {"userId": "2"}},
                42
            ]
        });

        let page = decode_transaction_page(Some(&payload)).unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.skipped, 1);

        let tx = &page.content[0];
        assert!(tx.from_wallet.is_none());
        assert_eq!(tx.to_wallet.as_ref().unwrap().user_id, None);
    }

    #[test]
    fn test_malformed_pages() {
        assert!(decode_transaction_page(None).is_err());
        assert!(decode_transaction_page(Some(&Value::Null)).is_err());
        assert!(decode_transaction_page(Some(&json!([]))).is_err());
        assert!(decode_transaction_page(Some(&json!({"content": null}))).is_err());
    }

    #[test]
    fn test_decode_wallets() {
        let bare = json!([{"id": 1, "name": "Main", "balance": 100}, {"id": 2, "balance": "50.25"}]);
        let wallets = decode_wallets(Some(&bare)).unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[1].balance(), Ok(dec!(50.25)));

        let enveloped = json!({"data": [{"id": 3, "name": "Savings", "balance": 1}]});
        assert_eq!(decode_wallets(Some(&enveloped)).unwrap().len(), 1);

        assert!(decode_wallets(Some(&Value::Null)).is_err());
        assert!(decode_wallets(Some(&json!({"message": "oops"}))).is_err());
    }

    #[test]
    fn test_timestamp_formats() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();

        let zoned = Transaction {
            created_at: json!("2024-05-01T10:00:00Z"),
            ..Default::default()
        };
        assert_eq!(zoned.created_at_in(&tz).unwrap().hour(), 13);

        // Offset-less values are wall-clock time in the viewer's zone
        let naive = Transaction {
            created_at: json!("2024-05-01T10:00:00.123456"),
            ..Default::default()
        };
        let local = naive.created_at_in(&tz).unwrap();
        assert_eq!(local.hour(), 10);
        assert_eq!(local.with_timezone(&Utc).hour(), 7);

        let millis = Transaction {
            created_at: json!(1_714_557_600_000_i64),
            ..Default::default()
        };
        assert_eq!(
            millis.created_at_in(&Utc).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );

        let garbage = Transaction {
            created_at: json!("yesterday"),
            ..Default::default()
        };
        assert!(garbage.created_at_in(&tz).is_none());
        assert!(Transaction::default().created_at_in(&tz).is_none());
    }
}
