//! MDBX tables of the indexer database and the encodings of their values.

mod account;
pub use account::{AccountEntry, AccountIdEntry, AccountIds, Accounts};

mod block;
pub use block::{BlockEntry, Blocks};

mod transaction;
pub use transaction::{TransactionEntry, Transactions};

mod settings;
pub use settings::{SETTINGS_KEY, SettingsEntry, SettingsTable};

use reth_codecs::Compact;

/// Stores `Compact` values uncompressed, as the raw compact encoding.
macro_rules! compact_values {
    ($($name:ident),+) => {
        $(
            impl reth_db_api::table::Compress for $name {
                type Compressed = Vec<u8>;

                fn compress_to_buf<B: bytes::BufMut + AsMut<[u8]>>(&self, buf: &mut B) {
                    let _ = Compact::to_compact(self, buf);
                }
            }

            impl reth_db_api::table::Decompress for $name {
                fn decompress(value: &[u8]) -> Result<Self, reth_db_api::DatabaseError> {
                    Ok(Compact::from_compact(value, value.len()).0)
                }
            }
        )+
    };
}

/// Registers tables with MDBX: a `TableInfo` for each, and a `TableSet` holding all of them.
macro_rules! tables {
    ($(#[$meta:meta])* $set:ident { $($table:ty),+ $(,)? }) => {
        $(
            impl reth_db_api::table::TableInfo for $table {
                fn name(&self) -> &'static str {
                    <$table as reth_db_api::table::Table>::NAME
                }

                fn is_dupsort(&self) -> bool {
                    <$table as reth_db_api::table::Table>::DUPSORT
                }
            }
        )+

        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub(crate) struct $set;

        impl reth_db_api::TableSet for $set {
            fn tables() -> Box<dyn Iterator<Item = Box<dyn reth_db_api::table::TableInfo>>> {
                let tables: Vec<Box<dyn reth_db_api::table::TableInfo>> =
                    vec![$(Box::new(<$table>::default())),+];
                Box::new(tables.into_iter())
            }
        }
    };
}

compact_values!(AccountEntry, AccountIdEntry, BlockEntry, TransactionEntry, SettingsEntry);

tables!(
    /// Every table of the indexer database.
    Tables { Accounts, AccountIds, Blocks, Transactions, SettingsTable }
);
