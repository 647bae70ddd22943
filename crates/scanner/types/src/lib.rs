//! Core types shared across the chainscan crates.
//!
//! The pipeline never carries the node's wire shapes directly. RPC adapters normalize responses
//! into [`Block`], [`Transaction`] and [`Receipt`], and storage backends persist the row shapes
//! [`BlockRow`] and [`TransactionRow`].

mod account;
pub use account::{Account, NewAccount};

mod block;
pub use block::{Block, BlockRow};

mod transaction;
pub use transaction::{Receipt, Transaction, TransactionRow};

mod envelope;
pub use envelope::{
    BlockFetch, BlockPersist, Envelope, PendingTransaction, TransactionFetch, TransactionPersist,
};

mod settings;
pub use settings::Settings;
