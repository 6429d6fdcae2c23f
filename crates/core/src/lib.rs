//! core data types for the Tessera multi-token ledger

pub mod event;
pub mod types;

pub use event::Event;
pub use types::{Address, Amount, TokenId, NULL_ACCOUNT};
