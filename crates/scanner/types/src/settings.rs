use serde::{Deserialize, Serialize};

/// Singleton indexer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Highest block number whose block and transactions are fully persisted. The resume point
    /// after a restart.
    pub latest_synced_block: u64,
}

impl Settings {
    /// Creates settings with the given watermark.
    pub const fn new(latest_synced_block: u64) -> Self {
        Self { latest_synced_block }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_serde() {
        let settings = Settings::new(102);
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"latest_synced_block":102}"#);
        assert_eq!(serde_json::from_str::<Settings>(&json).unwrap(), settings);
    }
}
