//! In-memory store of per-provider connection records.
//!
//! Records are created lazily (defaulting to `Disconnected`) the first time
//! a provider is touched, and are only ever transitioned, never removed.
//! The store is written exclusively by the connection manager; everything
//! else reads snapshots.

use dashmap::DashMap;

use crate::connection::ConnectionRecord;
use crate::provider::Provider;

/// Map from provider to its current connection record.
pub struct ConnectionStore {
    records: DashMap<Provider, ConnectionRecord>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self { records: DashMap::new() }
    }

    /// Current record for a provider, seeding a `Disconnected` record if
    /// the provider has never been touched.
    pub fn get(&self, provider: Provider) -> ConnectionRecord {
        self.records
            .entry(provider)
            .or_insert_with(|| ConnectionRecord::disconnected(provider))
            .clone()
    }

    /// Mutate a provider's record in place and return the updated copy.
    pub fn update<F>(&self, provider: Provider, apply: F) -> ConnectionRecord
    where
        F: FnOnce(&mut ConnectionRecord),
    {
        let mut entry = self
            .records
            .entry(provider)
            .or_insert_with(|| ConnectionRecord::disconnected(provider));
        apply(entry.value_mut());
        entry.clone()
    }

    /// Snapshot of all providers' records, in `Provider::ALL` order.
    pub fn snapshot(&self) -> Vec<ConnectionRecord> {
        Provider::ALL.iter().map(|p| self.get(*p)).collect()
    }
}

impl Default for ConnectionStore {
    fn default() -> Self {
        Self::new()
    }
}
