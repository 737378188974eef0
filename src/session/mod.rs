//! Session handling
//!
//! The current login lives in a single storage slot. Components that need
//! the viewer's identity receive a [`SessionStore`] by reference instead of
//! reaching for global state.
//!
//! ```text
//! login → SessionStore::set ─┐
//!                            ├→ current_identity() → aggregator / client
//! logout → SessionStore::clear
//! ```

pub mod guard;
pub mod store;
pub mod types;

pub use guard::{authorize, Access};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{Session, UserId, UserIdentity};
