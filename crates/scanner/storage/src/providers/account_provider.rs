//! Provider for account identity operations.

use crate::{
    error::StorageError,
    models::{AccountEntry, AccountIdEntry, AccountIds, Accounts},
};
use alloy_primitives::Address;
use chainscan_types::{Account, NewAccount};
use reth_db_api::{
    cursor::DbCursorRO,
    transaction::{DbTx, DbTxMut},
};
use tracing::{debug, error};

/// Provides access to account storage operations within a transaction.
#[derive(Debug)]
pub(crate) struct AccountProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> AccountProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> AccountProvider<'_, TX>
where
    TX: DbTx,
{
    /// Looks up the account assigned to `address`.
    pub(crate) fn get_account(&self, address: Address) -> Result<Option<Account>, StorageError> {
        let Some(AccountIdEntry { id }) =
            self.tx.get::<AccountIds>(address).inspect_err(|err| {
                error!(target: "scan_storage", %address, ?err, "Failed to read account id");
            })?
        else {
            return Ok(None);
        };

        let entry = self.tx.get::<Accounts>(id).inspect_err(|err| {
            error!(target: "scan_storage", %address, id, ?err, "Failed to read account");
        })?;

        let entry = entry.ok_or_else(|| {
            error!(target: "scan_storage", %address, id, "Account id without account entry");
            StorageError::EntryNotFound(format!("account {id} for {address}"))
        })?;

        Ok(Some(entry.into_account(id)))
    }

    /// Returns the next unassigned account id.
    fn next_account_id(&self) -> Result<u64, StorageError> {
        let mut cursor = self.tx.cursor_read::<Accounts>().inspect_err(|err| {
            error!(target: "scan_storage", ?err, "Failed to get cursor for Accounts");
        })?;

        let last = cursor.last().inspect_err(|err| {
            error!(target: "scan_storage", ?err, "Failed to seek to last account");
        })?;

        Ok(last.map_or(1, |(id, _)| id + 1))
    }
}

impl<TX> AccountProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Finds the account for the address or assigns it the next free id.
    ///
    /// Runs inside a single write transaction, so concurrent callers are serialised by the
    /// database and an address never receives two ids.
    pub(crate) fn create_account(
        &self,
        account: NewAccount,
    ) -> Result<(Account, bool), StorageError> {
        if let Some(existing) = self.get_account(account.address)? {
            return Ok((existing, false));
        }

        let id = self.next_account_id()?;
        let entry = AccountEntry { address: account.address, is_contract: account.is_contract };

        self.tx.put::<Accounts>(id, entry).inspect_err(|err| {
            error!(
                target: "scan_storage",
                address = %account.address,
                id,
                ?err,
                "Failed to store account"
            );
        })?;
        self.tx.put::<AccountIds>(account.address, AccountIdEntry { id }).inspect_err(|err| {
            error!(
                target: "scan_storage",
                address = %account.address,
                id,
                ?err,
                "Failed to index account"
            );
        })?;

        debug!(target: "scan_storage", address = %account.address, id, "Created account");
        Ok((entry.into_account(id), true))
    }
}
