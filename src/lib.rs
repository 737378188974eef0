//! Wallet Dashboard Library
//!
//! Client for the wallet backend: session handling, transfers, paged
//! history and the viewer's net amounts over trailing and calendar windows.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
