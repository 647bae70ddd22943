//! Model for the singleton settings record.

use chainscan_types::Settings;
use reth_codecs::Compact;
use reth_db_api::table::Table;
use serde::{Deserialize, Serialize};

/// The only key used in [`SettingsTable`].
pub const SETTINGS_KEY: u64 = 1;

/// Value of the [`SettingsTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Compact)]
pub struct SettingsEntry {
    /// Highest fully persisted block number.
    pub latest_synced_block: u64,
}

impl From<Settings> for SettingsEntry {
    fn from(settings: Settings) -> Self {
        Self { latest_synced_block: settings.latest_synced_block }
    }
}

impl From<SettingsEntry> for Settings {
    fn from(entry: SettingsEntry) -> Self {
        Self { latest_synced_block: entry.latest_synced_block }
    }
}

/// A single-row table holding the indexer settings under [`SETTINGS_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct SettingsTable;

impl Table for SettingsTable {
    const NAME: &'static str = "settings";
    const DUPSORT: bool = false;
    type Key = u64;
    type Value = SettingsEntry;
}
