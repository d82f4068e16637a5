//! Append-only store of per-device results.

use tokio::sync::RwLock;

use crate::model::DeviceResult;

/// Collects [`DeviceResult`]s from concurrently running device testers.
///
/// Writes are serialised behind the write lock and a reader always sees
/// whole entries.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: RwLock<Vec<DeviceResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one device's results.
    pub async fn save(&self, result: DeviceResult) {
        self.results.write().await.push(result);
    }

    /// Snapshot of everything saved so far, in save order.
    pub async fn read(&self) -> Vec<DeviceResult> {
        self.results.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}
