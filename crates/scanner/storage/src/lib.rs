//! Persistent storage for the chainscan indexer.
//!
//! Blocks, transactions, accounts and the sync watermark are kept in a single MDBX environment.
//! [`ScanDb`] implements every storage trait, each write running in its own transaction that
//! is committed only when all of its rows were written.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod error;
pub use error::StorageError;

mod providers;

mod models;
pub use models::{
    AccountEntry, AccountIdEntry, AccountIds, Accounts, BlockEntry, Blocks, SETTINGS_KEY,
    SettingsEntry, SettingsTable, TransactionEntry, Transactions,
};

mod chaindb;
pub use chaindb::ScanDb;

mod traits;
pub use traits::{AccountStorage, BlockStorage, ScanStorage, SettingsStorage, TransactionStorage};
