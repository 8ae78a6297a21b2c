//! Mock post-processor for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::postprocess::{PostProcessError, PostProcessReport, PostProcessRequest, PostProcessor};

/// A recorded post-processing call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPostProcess {
    /// The request that was submitted.
    pub request: PostProcessRequest,
    /// Whether the call succeeded.
    pub success: bool,
}

/// Mock implementation of the PostProcessor trait.
///
/// Records every request, optionally sleeps to simulate work, and can be
/// told to fail the next call.
///
/// # Example
///
/// ```rust,ignore
/// use plexdl_core::testing::MockPostProcessor;
///
/// let processor = MockPostProcessor::new();
/// processor.set_next_error(PostProcessError::TaskFailed("boom".into())).await;
///
/// // ... run a download job ...
///
/// assert_eq!(processor.call_count().await, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockPostProcessor {
    calls: Arc<RwLock<Vec<RecordedPostProcess>>>,
    next_error: Arc<RwLock<Option<PostProcessError>>>,
    delay_ms: Arc<RwLock<u64>>,
}

impl MockPostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedPostProcess> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: PostProcessError) {
        *self.next_error.write().await = Some(error);
    }

    /// Simulated processing time.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }
}

#[async_trait]
impl PostProcessor for MockPostProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process_directory(
        &self,
        request: &PostProcessRequest,
    ) -> Result<PostProcessReport, PostProcessError> {
        let delay_ms = *self.delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let error = self.next_error.write().await.take();
        self.calls.write().await.push(RecordedPostProcess {
            request: request.clone(),
            success: error.is_none(),
        });
        match error {
            Some(err) => Err(err),
            None => Ok(PostProcessReport::default()),
        }
    }
}
