use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::warn;

/// Subscriber emails persisted as a JSON file. The set is small and updates
/// are rare, so plain read-modify-write is enough.
pub struct SubscriberStore {
    path: PathBuf,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing or unreadable file yields an empty set.
    pub fn load(&self) -> BTreeSet<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring malformed subscriber file: {}", e);
                BTreeSet::new()
            }),
            Err(_) => BTreeSet::new(),
        }
    }

    pub fn save(&self, subscribers: &BTreeSet<String>) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(subscribers)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn add(&self, email: &str) -> anyhow::Result<BTreeSet<String>> {
        let mut subscribers = self.load();
        if subscribers.insert(email.to_string()) {
            self.save(&subscribers)?;
        }
        Ok(subscribers)
    }

    pub fn remove(&self, email: &str) -> anyhow::Result<BTreeSet<String>> {
        let mut subscribers = self.load();
        if subscribers.remove(email) {
            self.save(&subscribers)?;
        }
        Ok(subscribers)
    }
}
