//! Post-processing held back while other parts of a content item are pending.

use std::sync::Arc;

use dashmap::DashMap;

use crate::postprocess::PostProcessRequest;
use crate::queue::ContentId;

/// Requests of completed parts whose post-processing was gated, per content.
///
/// The part that finishes last drains the entry and processes every
/// directory the content landed in, not only its own.
#[derive(Debug, Clone, Default)]
pub struct DeferredPostProcess {
    requests: Arc<DashMap<ContentId, Vec<PostProcessRequest>>>,
}

impl DeferredPostProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `request` until the content's last part completes. A later
    /// request for the same directory replaces the earlier one.
    pub fn defer(&self, content_id: &ContentId, request: PostProcessRequest) {
        let mut entry = self.requests.entry(content_id.clone()).or_default();
        entry.retain(|r| r.path != request.path);
        entry.push(request);
    }

    /// Remove and return the held requests in the order they were deferred.
    pub fn take(&self, content_id: &ContentId) -> Vec<PostProcessRequest> {
        self.requests
            .remove(content_id)
            .map(|(_, requests)| requests)
            .unwrap_or_default()
    }

    pub fn pending(&self, content_id: &ContentId) -> usize {
        self.requests.get(content_id).map_or(0, |r| r.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ContentKind;
    use std::path::PathBuf;

    fn request(dir: &str, season: u32) -> PostProcessRequest {
        PostProcessRequest {
            path: PathBuf::from(dir),
            title: "Dark".to_string(),
            season_hint: Some(season),
            kind: ContentKind::Series,
            year: None,
        }
    }

    #[test]
    fn test_take_returns_deferred_in_order() {
        let deferred = DeferredPostProcess::new();
        let dark = ContentId::new("/tv/Dark");
        deferred.defer(&dark, request("/tv/Dark/Season 01", 1));
        deferred.defer(&dark, request("/tv/Dark/Season 02", 2));
        deferred.defer(&ContentId::new("/tv/Other"), request("/tv/Other", 1));

        let taken = deferred.take(&dark);
        let seasons: Vec<_> = taken.iter().map(|r| r.season_hint).collect();
        assert_eq!(seasons, vec![Some(1), Some(2)]);
        assert_eq!(deferred.pending(&dark), 0);
        assert_eq!(deferred.pending(&ContentId::new("/tv/Other")), 1);
    }

    #[test]
    fn test_same_directory_deferred_once() {
        let deferred = DeferredPostProcess::new();
        let dark = ContentId::new("/tv/Dark");
        deferred.defer(&dark, request("/tv/Dark/Season 01", 1));
        deferred.defer(&dark, request("/tv/Dark/Season 02", 2));
        deferred.defer(&dark, request("/tv/Dark/Season 01", 1));

        let paths: Vec<_> = deferred.take(&dark).into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/tv/Dark/Season 02"),
                PathBuf::from("/tv/Dark/Season 01")
            ]
        );
    }
}
