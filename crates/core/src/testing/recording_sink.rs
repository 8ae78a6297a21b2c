//! Progress sink that keeps every update.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::progress::{ProgressSink, ProgressSinkError, ProgressUpdate};

/// Collects forwarded progress updates in order.
///
/// Cheap to clone; clones share the same buffer. Can be told to fail, which
/// the runner must tolerate.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    updates: Arc<RwLock<Vec<ProgressUpdate>>>,
    failing: Arc<RwLock<bool>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records updates but reports an error for each one.
    pub fn failing() -> Self {
        Self {
            failing: Arc::new(RwLock::new(true)),
            ..Self::default()
        }
    }

    pub async fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.read().await.clone()
    }

    /// Just the percentages, in delivery order.
    pub async fn percents(&self) -> Vec<u8> {
        self.updates.read().await.iter().map(|u| u.percent).collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn on_progress(&self, update: ProgressUpdate) -> Result<(), ProgressSinkError> {
        self.updates.write().await.push(update);
        if *self.failing.read().await {
            return Err(ProgressSinkError("recording sink set to fail".to_string()));
        }
        Ok(())
    }
}
