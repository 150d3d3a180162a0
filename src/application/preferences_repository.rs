// Repository trait for durable client-side preferences

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not a JSON object: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// String key-value persistence, one value per key.
pub trait KeyValueStore: Send + Sync {
    /// Raw value for a key, `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
