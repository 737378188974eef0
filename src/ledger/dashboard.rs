//! Dashboard figures
//!
//! Four numbers: wallet count, total assets, and the viewer's net amount
//! over the trailing week and the current month. Every failure on the way
//! (bad payloads, failed fetches) degrades the affected figures to zero
//! instead of failing the report.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::types::PageRequest;
use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::session::store::SessionStore;
use crate::session::types::{UserId, UserIdentity};

use super::aggregator::{filter_by_window, net_amount, NetAmount};
use super::types::{decode_transaction_page, decode_wallets, Transaction, TransactionPage};
use super::window::TimeWindow;

/// Where wallet and transaction payloads come from
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Raw wallet list for a user
    async fn wallets_by_user(&self, user_id: UserId) -> Result<Value>;

    /// Raw transaction page for a user
    async fn transactions_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Value>;
}

/// Net amount over one window
#[derive(Debug, Clone)]
pub struct WindowTotal<Tz: TimeZone> {
    /// `M/D-M/D` for the trailing window, the month name for the monthly one
    pub label: String,
    pub window: TimeWindow<Tz>,
    /// Transactions that fell inside the window
    pub transactions: usize,
    pub net: NetAmount,
}

impl<Tz: TimeZone> WindowTotal<Tz> {
    fn compute(
        transactions: &[Transaction],
        label: String,
        window: TimeWindow<Tz>,
        viewer: &UserIdentity,
    ) -> Self {
        let members = filter_by_window(transactions, &window);
        let count = members.clone().count();
        let net = net_amount(members, viewer);
        Self {
            label,
            window,
            transactions: count,
            net,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardSummary<Tz: TimeZone> {
    pub wallet_count: usize,
    pub total_assets: Decimal,
    pub weekly: WindowTotal<Tz>,
    pub monthly: WindowTotal<Tz>,
    /// The backend holds more history than the page that was aggregated,
    /// so the window totals may be short
    pub history_truncated: bool,
    /// Backend rejected the session while loading; figures are degraded
    pub session_expired: bool,
}

impl<Tz: TimeZone> DashboardSummary<Tz> {
    /// Build the figures from raw payloads. Never fails.
    ///
    /// `None` or malformed payloads yield zero for the figures they feed.
    pub fn compute(
        viewer: &UserIdentity,
        wallets: Option<&Value>,
        transactions: Option<&Value>,
        now: DateTime<Tz>,
        config: &DashboardConfig,
    ) -> Self {
        let wallets = decode_wallets(wallets).unwrap_or_else(|e| {
            warn!(error = %e, "Wallet payload unusable, showing zero wallets");
            Vec::new()
        });

        let mut total_assets = Decimal::ZERO;
        let mut invalid_balances = 0usize;
        for wallet in &wallets {
            match wallet.balance() {
                Ok(balance) => match total_assets.checked_add(balance) {
                    Some(sum) => total_assets = sum,
                    None => invalid_balances += 1,
                },
                Err(_) => invalid_balances += 1,
            }
        }
        if invalid_balances > 0 {
            warn!(invalid_balances, "Some wallet balances were unusable, counted as zero");
        }

        let page = decode_transaction_page(transactions).unwrap_or_else(|e| {
            warn!(error = %e, "Transaction payload unusable, showing zero totals");
            TransactionPage::default()
        });

        let history_truncated = match page.total_elements {
            Some(total) if total > page.content.len() as u64 + page.skipped as u64 => {
                warn!(
                    total,
                    fetched = page.content.len(),
                    "Only the first page of history was aggregated, window totals may be incomplete"
                );
                true
            }
            _ => false,
        };

        let weekly_window = TimeWindow::trailing_days(now.clone(), config.trailing_days);
        let weekly = WindowTotal::compute(
            &page.content,
            weekly_window.range_label(),
            weekly_window,
            viewer,
        );
        let monthly_window = TimeWindow::current_month(now);
        let monthly = WindowTotal::compute(
            &page.content,
            monthly_window.month_label().to_string(),
            monthly_window,
            viewer,
        );

        Self {
            wallet_count: wallets.len(),
            total_assets,
            weekly,
            monthly,
            history_truncated,
            session_expired: false,
        }
    }
}

/// Loads dashboard figures for the logged-in user
pub struct Dashboard<'a, S: LedgerSource + ?Sized> {
    source: &'a S,
    config: DashboardConfig,
}

impl<'a, S: LedgerSource + ?Sized> Dashboard<'a, S> {
    pub fn new(source: &'a S, config: DashboardConfig) -> Self {
        Self { source, config }
    }

    /// Fetch wallets and transactions concurrently and compute the summary.
    ///
    /// Fails only when nobody is logged in. Fetch failures are logged and
    /// zeroed; a 401 sets `session_expired`. Dropping the future cancels
    /// both requests.
    pub async fn load<Tz>(&self, session: &dyn SessionStore, now: DateTime<Tz>) -> Result<DashboardSummary<Tz>>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let viewer = session.current_identity().ok_or(Error::Unauthenticated)?;
        let page = PageRequest::first(self.config.history_page_size);

        let (wallets, transactions) = tokio::join!(
            self.source.wallets_by_user(viewer.id),
            self.source.transactions_by_user(viewer.id, page),
        );

        let mut session_expired = false;
        let mut settle = |what: &str, fetched: Result<Value>| match fetched {
            Ok(value) => Some(value),
            Err(e) => {
                session_expired |= matches!(e, Error::Unauthorized);
                warn!(what, error = %e, "Fetch failed, figures degraded to zero");
                None
            }
        };
        let wallets = settle("wallets", wallets);
        let transactions = settle("transactions", transactions);

        let mut summary = DashboardSummary::compute(
            &viewer,
            wallets.as_ref(),
            transactions.as_ref(),
            now,
            &self.config,
        );
        summary.session_expired = session_expired;

        info!(
            user_id = %viewer.id,
            wallet_count = summary.wallet_count,
            total_assets = %summary.total_assets,
            weekly_window = %summary.weekly.window,
            weekly_transactions = summary.weekly.transactions,
            weekly_net = %summary.weekly.net.total,
            monthly_window = %summary.monthly.window,
            monthly_transactions = summary.monthly.transactions,
            monthly_net = %summary.monthly.net.total,
            history_truncated = summary.history_truncated,
            session_expired,
            "Dashboard loaded"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemorySessionStore;
    use crate::session::types::Session;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn alice() -> UserIdentity {
        UserIdentity::new(1, "alice")
    }

    fn alice_session() -> MemorySessionStore {
        MemorySessionStore::with_session(Session {
            id: UserId(1),
            username: "alice".into(),
            email: None,
            roles: vec!["ROLE_USER".into()],
            token: "t".into(),
            token_type: "Bearer".into(),
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 19, 12, 0, 0).unwrap()
    }

    fn transactions_payload() -> Value {
        let now = now();
        json!({
            "content": [
                {
                    "amount": 100,
                    "createdAt": (now - Duration::days(2)).to_rfc3339(),
                    "fromWallet": {"user": {"username": "alice"}},
                    "toWallet": {"user": {"username": "bob"}}
                },
                {
                    "amount": "50",
                    "createdAt": (now - Duration::days(10)).to_rfc3339(),
                    "fromWallet": {"userName": "bob"},
                    "toWallet": {"userId": 1}
                },
                {
                    "amount": 999,
                    "createdAt": (now - Duration::days(40)).to_rfc3339(),
                    "fromWallet": {"userName": "bob"},
                    "toWallet": {"userName": "alice"}
                }
            ]
        })
    }

    fn wallets_payload() -> Value {
        json!([
            {"id": 1, "name": "Main", "balance": 250.5},
            {"id": 2, "name": "Savings", "balance": "1000"},
            {"id": 3, "name": "Broken", "balance": "n/a"}
        ])
    }

    #[test]
    fn test_compute() {
        let summary = DashboardSummary::compute(
            &alice(),
            Some(&wallets_payload()),
            Some(&transactions_payload()),
            now(),
            &DashboardConfig::default(),
        );

        assert_eq!(summary.wallet_count, 3);
        assert_eq!(summary.total_assets, dec!(1250.5));
        assert_eq!(summary.weekly.transactions, 1);
        assert_eq!(summary.weekly.net.total, dec!(-100));
        assert_eq!(summary.monthly.transactions, 2);
        assert_eq!(summary.monthly.net.total, dec!(-50));
        assert_eq!(summary.weekly.label, "10/12-10/19");
        assert_eq!(summary.monthly.label, "October");
        assert!(!summary.history_truncated);
    }

    #[test]
    fn test_compute_flags_truncated_history() {
        let mut payload = transactions_payload();
        payload["totalElements"] = json!(250);
        payload["totalPages"] = json!(3);

        let summary = DashboardSummary::compute(
            &alice(),
            Some(&wallets_payload()),
            Some(&payload),
            now(),
            &DashboardConfig::default(),
        );
        assert!(summary.history_truncated);
        assert_eq!(summary.monthly.net.total, dec!(-50));

        payload["totalElements"] = json!(3);
        let summary = DashboardSummary::compute(
            &alice(),
            None,
            Some(&payload),
            now(),
            &DashboardConfig::default(),
        );
        assert!(!summary.history_truncated);
    }

    #[test]
    fn test_compute_with_huge_trailing_span() {
        let config = DashboardConfig {
            trailing_days: u64::MAX,
            ..DashboardConfig::default()
        };
        let summary = DashboardSummary::compute(
            &alice(),
            None,
            Some(&transactions_payload()),
            now(),
            &config,
        );
        // Every past transaction falls inside an unbounded trailing window
        assert_eq!(summary.weekly.transactions, 3);
        assert_eq!(summary.weekly.net.total, dec!(949));
    }

    #[test]
    fn test_compute_with_null_payloads() {
        let summary = DashboardSummary::compute(
            &alice(),
            Some(&Value::Null),
            Some(&Value::Null),
            now(),
            &DashboardConfig::default(),
        );
        assert_eq!(summary.wallet_count, 0);
        assert_eq!(summary.total_assets, Decimal::ZERO);
        assert_eq!(summary.weekly.net.total, Decimal::ZERO);
        assert_eq!(summary.monthly.net.total, Decimal::ZERO);

        let summary =
            DashboardSummary::compute(&alice(), None, None, now(), &DashboardConfig::default());
        assert_eq!(summary.wallet_count, 0);
        assert_eq!(summary.monthly.transactions, 0);
    }

    enum Behaviour {
        Ok,
        Unauthorized,
        Down,
    }

    struct FakeSource {
        wallets: Behaviour,
        transactions: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(wallets: Behaviour, transactions: Behaviour) -> Self {
            Self {
                wallets,
                transactions,
                calls: AtomicUsize::new(0),
            }
        }

        fn respond(behaviour: &Behaviour, payload: Value) -> Result<Value> {
            match behaviour {
                Behaviour::Ok => Ok(payload),
                Behaviour::Unauthorized => Err(Error::Unauthorized),
                Behaviour::Down => Err(Error::Http("connection refused".into())),
            }
        }
    }

    #[async_trait]
    impl LedgerSource for FakeSource {
        async fn wallets_by_user(&self, user_id: UserId) -> Result<Value> {
            assert_eq!(user_id, UserId(1));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Self::respond(&self.wallets, wallets_payload())
        }

        async fn transactions_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Value> {
            assert_eq!(user_id, UserId(1));
            assert_eq!(page.page, 0);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Self::respond(&self.transactions, transactions_payload())
        }
    }

    #[tokio::test]
    async fn test_load() {
        let source = FakeSource::new(Behaviour::Ok, Behaviour::Ok);
        let dashboard = Dashboard::new(&source, DashboardConfig::default());

        let summary = dashboard.load(&alice_session(), now()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.wallet_count, 3);
        assert_eq!(summary.monthly.net.total, dec!(-50));
        assert!(!summary.session_expired);
    }

    #[test]
    fn test_load_outside_runtime() {
        let source = FakeSource::new(Behaviour::Ok, Behaviour::Ok);
        let dashboard = Dashboard::new(&source, DashboardConfig::default());

        let summary = tokio_test::block_on(dashboard.load(&alice_session(), now())).unwrap();
        assert_eq!(summary.weekly.net.total, dec!(-100));
    }

    #[tokio::test]
    async fn test_load_requires_login() {
        let source = FakeSource::new(Behaviour::Ok, Behaviour::Ok);
        let dashboard = Dashboard::new(&source, DashboardConfig::default());

        let result = dashboard.load(&MemorySessionStore::new(), now()).await;
        assert!(matches!(result, Err(Error::Unauthenticated)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_degrades_only_its_figures() {
        let source = FakeSource::new(Behaviour::Ok, Behaviour::Down);
        let dashboard = Dashboard::new(&source, DashboardConfig::default());

        let summary = dashboard.load(&alice_session(), now()).await.unwrap();
        assert_eq!(summary.wallet_count, 3);
        assert_eq!(summary.weekly.net.total, Decimal::ZERO);
        assert_eq!(summary.monthly.net.total, Decimal::ZERO);
        assert!(!summary.session_expired);
    }

    #[tokio::test]
    async fn test_unauthorized_flags_expired_session() {
        let source = FakeSource::new(Behaviour::Unauthorized, Behaviour::Unauthorized);
        let dashboard = Dashboard::new(&source, DashboardConfig::default());

        let summary = dashboard.load(&alice_session(), now()).await.unwrap();
        assert!(summary.session_expired);
        assert_eq!(summary.wallet_count, 0);
        assert_eq!(summary.total_assets, Decimal::ZERO);
    }
}
