//! Ledger reporting
//!
//! Turns raw wallet and transaction payloads into the viewer's figures.
//!
//! ```text
//! payload → decode (types) → filter_by_window (window) → net_amount (aggregator)
//!                                                           ↓
//!                                                    DashboardSummary
//! ```
//!
//! Everything here is pure and synchronous except [`Dashboard::load`],
//! which only adds the two concurrent fetches in front.

pub mod aggregator;
pub mod amount;
pub mod dashboard;
pub mod types;
pub mod window;

pub use aggregator::{
    classify_party, direction, filter_by_window, net_amount, resolve_party, AggregationStats,
    Direction, NetAmount, PartyClass, ResolvedParty,
};
pub use amount::{parse_amount, InvalidAmount};
pub use dashboard::{Dashboard, DashboardSummary, LedgerSource, WindowTotal};
pub use types::{
    decode_transaction_page, decode_wallets, MalformedPayload, Party, PartyUser, Transaction,
    TransactionPage, TransactionType, WalletRecord,
};
pub use window::TimeWindow;
