use crate::error::KVError;

/// KVStore is the persistence collaborator behind the registry and ledger.
///
/// Keys follow a namespaced convention: `custody:batch:B1`,
/// `custody:event:B1:00000000000000000002`, etc.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a single key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Write several key-value pairs as one unit. Readers observe either
    /// none or all of the entries.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError>;

    /// Scan all keys matching a prefix. Returns sorted (key, value) pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;
}
