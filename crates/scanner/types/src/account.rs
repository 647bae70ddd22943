use alloy_primitives::Address;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// An account row as assigned by storage.
///
/// The numeric `id` is assigned exactly once per address and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Constructor)]
pub struct Account {
    /// Storage-assigned numeric id.
    pub id: u64,
    /// Canonical chain address.
    pub address: Address,
    /// Whether the account was first seen as the target of a contract creation.
    pub is_contract: bool,
}

/// Request to find or create an account for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Constructor)]
pub struct NewAccount {
    /// Canonical chain address.
    pub address: Address,
    /// Contract flag applied if the account has to be created.
    pub is_contract: bool,
}

impl NewAccount {
    /// Creates a request for an externally owned account.
    pub const fn external(address: Address) -> Self {
        Self { address, is_contract: false }
    }

    /// Creates a request for a contract account.
    pub const fn contract(address: Address) -> Self {
        Self { address, is_contract: true }
    }
}
