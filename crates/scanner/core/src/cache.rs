//! In-memory map from addresses to storage account ids.

use crate::metrics::Metrics;
use alloy_primitives::Address;
use std::collections::HashMap;

/// Remembers the account id assigned to each address seen in this process.
///
/// The cache is unbounded and never evicts. It is rebuilt lazily after a restart, each miss
/// falling back to a storage find-or-create.
#[derive(Debug, Default)]
pub struct AccountCache {
    accounts: HashMap<Address, u64>,
}

impl AccountCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id cached for `address`.
    pub fn get(&self, address: &Address) -> Option<u64> {
        let id = self.accounts.get(address).copied();
        Metrics::record_cache_lookup(id.is_some());
        id
    }

    /// Caches `id` for `address`, replacing any previous value.
    pub fn set(&mut self, address: Address, id: u64) {
        self.accounts.insert(address, id);
    }

    /// Returns the number of cached addresses.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.accounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_latest_set() {
        let mut cache = AccountCache::new();
        let address = Address::repeat_byte(0x01);

        assert_eq!(cache.get(&address), None);
        cache.set(address, 1);
        cache.set(address, 7);

        assert_eq!(cache.get(&address), Some(7));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_empties_cache() {
        let mut cache = AccountCache::new();
        cache.set(Address::repeat_byte(0x01), 1);
        cache.set(Address::repeat_byte(0x02), 2);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&Address::repeat_byte(0x01)), None);
    }
}
