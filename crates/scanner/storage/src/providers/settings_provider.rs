//! Provider for the settings record.

use crate::{
    error::StorageError,
    models::{SETTINGS_KEY, SettingsEntry, SettingsTable},
};
use chainscan_types::Settings;
use reth_db_api::transaction::{DbTx, DbTxMut};
use tracing::error;

/// Provides access to the settings record within a transaction.
#[derive(Debug)]
pub(crate) struct SettingsProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> SettingsProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> SettingsProvider<'_, TX>
where
    TX: DbTx,
{
    /// Reads the settings, falling back to the defaults on a fresh database.
    pub(crate) fn settings(&self) -> Result<Settings, StorageError> {
        let entry = self.tx.get::<SettingsTable>(SETTINGS_KEY).inspect_err(|err| {
            error!(target: "scan_storage", ?err, "Failed to read settings");
        })?;
        Ok(entry.map(Settings::from).unwrap_or_default())
    }
}

impl<TX> SettingsProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    pub(crate) fn update_settings(&self, settings: Settings) -> Result<(), StorageError> {
        self.tx.put::<SettingsTable>(SETTINGS_KEY, SettingsEntry::from(settings)).inspect_err(
            |err| {
                error!(target: "scan_storage", ?settings, ?err, "Failed to write settings");
            },
        )?;
        Ok(())
    }
}
