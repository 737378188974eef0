//! Net-amount aggregation
//!
//! Direction is never stored on a transaction. It is derived here, relative
//! to a viewer:
//!
//! | sender | receiver | contribution |
//! |--------|----------|--------------|
//! | viewer | viewer   | 0            |
//! | viewer | other    | -amount      |
//! | other  | viewer   | +amount      |
//! | other  | other    | 0            |
//!
//! "Is the viewer" is decided by comparing resolved usernames, not ids.
//! Two accounts sharing a username are therefore indistinguishable here.

use chrono::TimeZone;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::session::types::UserIdentity;

use super::types::{Party, Transaction};
use super::window::TimeWindow;

/// Name a party resolves to, before comparing with the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedParty<'a> {
    Named(&'a str),
    Unknown,
}

/// A party relative to the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyClass<'a> {
    Viewer,
    Counterparty(&'a str),
    Unknown,
}

/// How a transaction moves value for the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SelfTransfer,
    Outgoing,
    Incoming,
    Unrelated,
}

/// Resolve a party to a username.
///
/// Priority: nested user's username, then the wallet's `userName`, then the
/// viewer's own username when the wallet's owner id is the viewer's id.
/// Empty strings count as absent.
pub fn resolve_party<'a>(party: Option<&'a Party>, viewer: &'a UserIdentity) -> ResolvedParty<'a> {
    let Some(party) = party else {
        return ResolvedParty::Unknown;
    };

    let nested = party
        .user
        .as_ref()
        .and_then(|u| u.username.as_deref())
        .filter(|name| !name.is_empty());
    if let Some(name) = nested {
        return ResolvedParty::Named(name);
    }

    if let Some(name) = party.user_name.as_deref().filter(|name| !name.is_empty()) {
        return ResolvedParty::Named(name);
    }

    if party.user_id == Some(viewer.id) {
        return ResolvedParty::Named(&viewer.username);
    }

    ResolvedParty::Unknown
}

/// Classify a party as the viewer, somebody else, or unknown
pub fn classify_party<'a>(party: Option<&'a Party>, viewer: &'a UserIdentity) -> PartyClass<'a> {
    match resolve_party(party, viewer) {
        ResolvedParty::Named(name) if name == viewer.username => PartyClass::Viewer,
        ResolvedParty::Named(name) => PartyClass::Counterparty(name),
        ResolvedParty::Unknown => PartyClass::Unknown,
    }
}

/// Direction of a transaction from the viewer's perspective
pub fn direction(tx: &Transaction, viewer: &UserIdentity) -> Direction {
    let from = classify_party(tx.from_wallet.as_ref(), viewer);
    let to = classify_party(tx.to_wallet.as_ref(), viewer);

    match (from, to) {
        (PartyClass::Viewer, PartyClass::Viewer) => Direction::SelfTransfer,
        (PartyClass::Viewer, _) => Direction::Outgoing,
        (_, PartyClass::Viewer) => Direction::Incoming,
        _ => Direction::Unrelated,
    }
}

/// Counters collected during one aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub considered: usize,
    pub outgoing: usize,
    pub incoming: usize,
    pub self_transfers: usize,
    pub unrelated: usize,
    /// Missing, non-numeric or negative amounts (contributed zero)
    pub invalid_amounts: usize,
}

/// Signed total for the viewer plus how it was reached
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetAmount {
    pub total: Decimal,
    pub stats: AggregationStats,
}

/// Sum signed amounts for the viewer. Never fails.
pub fn net_amount<'a, I>(transactions: I, viewer: &UserIdentity) -> NetAmount
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut result = NetAmount::default();

    for tx in transactions {
        let stats = &mut result.stats;
        stats.considered += 1;

        let amount = match tx.amount() {
            Ok(amount) => amount,
            Err(e) => {
                stats.invalid_amounts += 1;
                debug!(transaction_id = ?tx.id, reason = %e, "Invalid amount, contributing zero");
                Decimal::ZERO
            }
        };

        let next = match direction(tx, viewer) {
            Direction::SelfTransfer => {
                stats.self_transfers += 1;
                continue;
            }
            Direction::Unrelated => {
                stats.unrelated += 1;
                continue;
            }
            Direction::Outgoing => {
                stats.outgoing += 1;
                result.total.checked_sub(amount)
            }
            Direction::Incoming => {
                stats.incoming += 1;
                result.total.checked_add(amount)
            }
        };

        match next {
            Some(total) => result.total = total,
            None => {
                result.stats.invalid_amounts += 1;
                warn!(transaction_id = ?tx.id, "Amount overflows running total, contributing zero");
            }
        }
    }

    if result.stats.invalid_amounts > 0 {
        warn!(
            invalid = result.stats.invalid_amounts,
            considered = result.stats.considered,
            "Some transaction amounts were unusable"
        );
    }
    if result.stats.unrelated > 0 {
        debug!(
            unrelated = result.stats.unrelated,
            viewer = %viewer.username,
            "Transactions not involving the viewer were excluded"
        );
    }

    result
}

/// Transactions created inside `window`, lazily and in input order.
///
/// The returned iterator is `Clone`, so it can be walked more than once.
/// Transactions without a usable timestamp are never included.
pub fn filter_by_window<'a, I, Tz>(
    transactions: I,
    window: &'a TimeWindow<Tz>,
) -> impl Iterator<Item = &'a Transaction> + Clone + 'a
where
    I: IntoIterator<Item = &'a Transaction>,
    I::IntoIter: Clone + 'a,
    Tz: TimeZone + 'a,
{
    let tz = window.end.timezone();
    transactions.into_iter().filter(move |tx| {
        tx.created_at_in(&tz)
            .is_some_and(|created| window.contains(&created))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::PartyUser;
    use crate::session::types::UserId;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn alice() -> UserIdentity {
        UserIdentity::new(1, "alice")
    }

    fn tx(amount: Value, from: Party, to: Party) -> Transaction {
        Transaction {
            amount,
            from_wallet: Some(from),
            to_wallet: Some(to),
            ..Default::default()
        }
    }

    fn at(amount: i64, from: &str, to: &str, created: chrono::DateTime<Utc>) -> Transaction {
        Transaction {
            created_at: json!(created.to_rfc3339()),
            ..tx(json!(amount), Party::named(from), Party::named(to))
        }
    }

    fn swapped(t: &Transaction) -> Transaction {
        Transaction {
            from_wallet: t.to_wallet.clone(),
            to_wallet: t.from_wallet.clone(),
            ..t.clone()
        }
    }

    #[test]
    fn test_outgoing() {
        let txs = vec![tx(json!(100), Party::named("alice"), Party::named("bob"))];
        let result = net_amount(&txs, &alice());
        assert_eq!(result.total, dec!(-100));
        assert_eq!(result.stats.outgoing, 1);
    }

    #[test]
    fn test_incoming() {
        let txs = vec![tx(json!(50), Party::named("bob"), Party::named("alice"))];
        assert_eq!(net_amount(&txs, &alice()).total, dec!(50));
    }

    #[test]
    fn test_self_transfer_is_zero() {
        for amount in [json!(30), json!(0), json!("1000000.01")] {
            let txs = vec![tx(amount, Party::named("alice"), Party::named("alice"))];
            let result = net_amount(&txs, &alice());
            assert_eq!(result.total, Decimal::ZERO);
            assert_eq!(result.stats.self_transfers, 1);
        }
    }

    #[test]
    fn test_empty() {
        let txs: Vec<Transaction> = vec![];
        let result = net_amount(&txs, &alice());
        assert_eq!(result.total, Decimal::ZERO);
        assert_eq!(result.stats, AggregationStats::default());

        let now = Utc::now();
        let window = TimeWindow::trailing_days(now, 7);
        assert_eq!(filter_by_window(&txs, &window).count(), 0);
    }

    #[test]
    fn test_unrelated_excluded() {
        let txs = vec![
            tx(json!(10), Party::named("bob"), Party::named("carol")),
            tx(json!(5), Party::default(), Party::default()),
        ];
        let result = net_amount(&txs, &alice());
        assert_eq!(result.total, Decimal::ZERO);
        assert_eq!(result.stats.unrelated, 2);
    }

    #[test]
    fn test_resolution_priority() {
        let viewer = alice();

        // Nested username wins over userName and userId
        let party = Party {
            user: Some(PartyUser {
                username: Some("bob".into()),
                ..Default::default()
            }),
            user_name: Some("alice".into()),
            user_id: Some(UserId(1)),
            ..Default::default()
        };
        assert_eq!(resolve_party(Some(&party), &viewer), ResolvedParty::Named("bob"));

        // Empty nested username falls through to userName
        let party = Party {
            user: Some(PartyUser {
                username: Some(String::new()),
                ..Default::default()
            }),
            user_name: Some("carol".into()),
            ..Default::default()
        };
        assert_eq!(classify_party(Some(&party), &viewer), PartyClass::Counterparty("carol"));

        // Owner id maps to the viewer's own name
        assert_eq!(classify_party(Some(&Party::owned_by(1)), &viewer), PartyClass::Viewer);
        assert_eq!(classify_party(Some(&Party::owned_by(2)), &viewer), PartyClass::Unknown);
        assert_eq!(classify_party(None, &viewer), PartyClass::Unknown);
    }

    #[test]
    fn test_id_fallback_in_totals() {
        let txs = vec![
            tx(json!(40), Party::owned_by(1), Party::named("bob")),
            tx(json!(15), Party::owned_by(2), Party::owned_by(1)),
        ];
        assert_eq!(net_amount(&txs, &alice()).total, dec!(-25));
    }

    #[test]
    fn test_name_comparison_not_id() {
        // A different account with the viewer's username counts as the viewer
        let impostor = Party {
            user: Some(PartyUser {
                id: Some(UserId(99)),
                username: Some("alice".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let txs = vec![tx(json!(10), Party::named("bob"), impostor)];
        assert_eq!(net_amount(&txs, &alice()).total, dec!(10));
    }

    #[test]
    fn test_unknown_never_matches_viewer() {
        let viewer = UserIdentity::new(5, "unknown");
        let txs = vec![tx(json!(10), Party::default(), Party::named("bob"))];
        assert_eq!(net_amount(&txs, &viewer).stats.unrelated, 1);
    }

    #[test]
    fn test_invalid_amounts_counted() {
        let txs = vec![
            tx(json!("abc"), Party::named("alice"), Party::named("bob")),
            tx(Value::Null, Party::named("bob"), Party::named("alice")),
            tx(json!(-20), Party::named("bob"), Party::named("alice")),
            tx(json!("7.5"), Party::named("bob"), Party::named("alice")),
        ];
        let result = net_amount(&txs, &alice());
        assert_eq!(result.total, dec!(7.5));
        assert_eq!(result.stats.invalid_amounts, 3);
        assert_eq!(result.stats.considered, 4);
    }

    #[test]
    fn test_direction_symmetry() {
        let txs = vec![
            tx(json!(100), Party::named("alice"), Party::named("bob")),
            tx(json!(35.5), Party::named("carol"), Party::named("alice")),
            tx(json!(12), Party::named("alice"), Party::named("alice")),
            tx(json!(8), Party::owned_by(1), Party::named("dave")),
            tx(json!(3), Party::named("bob"), Party::named("carol")),
        ];
        let mirrored: Vec<Transaction> = txs.iter().map(swapped).collect();

        let forward = net_amount(&txs, &alice()).total;
        let backward = net_amount(&mirrored, &alice()).total;
        assert_eq!(forward, dec!(-72.5));
        assert_eq!(forward, -backward);
    }

    #[test]
    fn test_filter_window_boundaries_and_order() {
        let end = Utc.with_ymd_and_hms(2024, 10, 19, 12, 0, 0).unwrap();
        let window = TimeWindow::trailing_days(end, 7);

        let txs = vec![
            at(1, "alice", "bob", window.start),
            at(2, "alice", "bob", window.start - Duration::seconds(1)),
            at(3, "bob", "alice", end),
            at(4, "bob", "alice", end + Duration::seconds(1)),
            at(5, "bob", "alice", end - Duration::days(3)),
            Transaction::default(),
        ];

        let ids: Vec<i64> = filter_by_window(&txs, &window)
            .map(|t| t.amount.as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_filter_is_restartable_and_idempotent() {
        let end = Utc.with_ymd_and_hms(2024, 10, 19, 12, 0, 0).unwrap();
        let window = TimeWindow::current_month(end);
        let txs = vec![
            at(1, "alice", "bob", end - Duration::days(2)),
            at(2, "alice", "bob", end - Duration::days(40)),
            at(3, "bob", "alice", end - Duration::hours(1)),
        ];

        let once = filter_by_window(&txs, &window);
        assert_eq!(once.clone().count(), 2);
        assert_eq!(once.clone().count(), 2);

        let first: Vec<&Transaction> = once.clone().collect();
        let twice: Vec<&Transaction> = filter_by_window(once, &window).collect();
        assert_eq!(first, twice);
        // Input untouched
        assert_eq!(txs.len(), 3);
    }

    #[test]
    fn test_windows_computed_independently() {
        let now = Utc.with_ymd_and_hms(2024, 10, 3, 12, 0, 0).unwrap();
        let week = TimeWindow::trailing_days(now, 7);
        let month = TimeWindow::current_month(now);

        let txs = vec![
            // Last week of September: weekly only
            at(100, "alice", "bob", now - Duration::days(5)),
            // This month: both
            at(30, "bob", "alice", now - Duration::days(1)),
        ];

        let weekly = net_amount(filter_by_window(&txs, &week), &alice());
        let monthly = net_amount(filter_by_window(&txs, &month), &alice());
        assert_eq!(weekly.total, dec!(-70));
        assert_eq!(monthly.total, dec!(30));
    }
}
