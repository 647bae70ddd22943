//! Models for storing account identities.
//!
//! Accounts are stored twice: once by their numeric id, which is assigned sequentially, and once
//! by address so that find-or-create can look an address up without a scan.

use alloy_primitives::Address;
use chainscan_types::Account;
use reth_codecs::Compact;
use reth_db_api::table::Table;
use serde::{Deserialize, Serialize};

/// Value of the [`Accounts`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Compact)]
pub struct AccountEntry {
    /// Canonical chain address.
    pub address: Address,
    /// Whether the account was created as a contract.
    pub is_contract: bool,
}

impl AccountEntry {
    /// Converts the entry into an [`Account`] carrying the given id.
    pub const fn into_account(self, id: u64) -> Account {
        Account { id, address: self.address, is_contract: self.is_contract }
    }
}

/// Value of the [`AccountIds`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Compact)]
pub struct AccountIdEntry {
    /// The numeric id assigned to the address.
    pub id: u64,
}

/// A table for storing accounts by numeric id.
///
/// - **Key**: `u64`: account id, assigned from 1 upwards
/// - **Value**: [`AccountEntry`]: address and contract flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Accounts;

impl Table for Accounts {
    const NAME: &'static str = "accounts";
    const DUPSORT: bool = false;
    type Key = u64;
    type Value = AccountEntry;
}

/// A table indexing account ids by address.
///
/// - **Key**: [`Address`]: canonical chain address
/// - **Value**: [`AccountIdEntry`]: the id in [`Accounts`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AccountIds;

impl Table for AccountIds {
    const NAME: &'static str = "account_ids";
    const DUPSORT: bool = false;
    type Key = Address;
    type Value = AccountIdEntry;
}
