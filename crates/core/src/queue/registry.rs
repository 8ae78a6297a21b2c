//! Per-session registry of spawned tool processes.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::metrics;
use crate::runner::{kill_pid, ProcessObserver};

use super::types::SessionId;

/// Tracks OS process ids per session so a session cancel can force-kill
/// anything the cooperative path leaves behind.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    pids: Arc<DashMap<SessionId, HashSet<u32>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: &SessionId, pid: u32) {
        self.pids.entry(session.clone()).or_default().insert(pid);
    }

    pub fn unregister(&self, session: &SessionId, pid: u32) {
        let now_empty = match self.pids.get_mut(session) {
            Some(mut set) => {
                set.remove(&pid);
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.pids.remove_if(session, |_, set| set.is_empty());
        }
    }

    /// Registered pids for a session, sorted.
    pub fn pids(&self, session: &SessionId) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .pids
            .get(session)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        pids.sort_unstable();
        pids
    }

    /// SIGKILL every registered process of the session. Returns the pids
    /// that were targeted; their registrations stay until [`forget`](Self::forget).
    pub fn kill_session(&self, session: &SessionId) -> Vec<u32> {
        let targeted = self.pids(session);
        for &pid in &targeted {
            if kill_pid(pid) {
                metrics::FORCED_KILLS.inc();
                warn!(session = %session, pid, "Force-killed download process");
            } else {
                debug!(session = %session, pid, "Process already gone");
            }
        }
        targeted
    }

    /// Drop the given registrations, leaving any registered since.
    pub fn forget(&self, session: &SessionId, pids: &[u32]) {
        for &pid in pids {
            self.unregister(session, pid);
        }
    }

    /// Observer that records processes under the given session.
    pub fn observer(&self, session: SessionId) -> Arc<SessionProcesses> {
        Arc::new(SessionProcesses {
            registry: self.clone(),
            session,
        })
    }
}

/// [`ProcessObserver`] bound to one session.
#[derive(Debug, Clone)]
pub struct SessionProcesses {
    registry: ProcessRegistry,
    session: SessionId,
}

impl SessionProcesses {
    pub fn session(&self) -> &SessionId {
        &self.session
    }
}

impl ProcessObserver for SessionProcesses {
    fn process_started(&self, pid: u32) {
        self.registry.register(&self.session, pid);
    }

    fn process_exited(&self, pid: u32) {
        self.registry.unregister(&self.session, pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let registry = ProcessRegistry::new();
        let s = SessionId::new("s1");
        registry.register(&s, 30);
        registry.register(&s, 10);
        assert_eq!(registry.pids(&s), vec![10, 30]);

        registry.unregister(&s, 30);
        registry.unregister(&s, 10);
        assert!(registry.pids(&s).is_empty());
        assert!(registry.pids.get(&s).is_none());
    }

    #[test]
    fn test_observer_is_session_scoped() {
        let registry = ProcessRegistry::new();
        let a = registry.observer(SessionId::new("a"));
        a.process_started(1234);
        assert_eq!(registry.pids(&SessionId::new("a")), vec![1234]);
        assert!(registry.pids(&SessionId::new("b")).is_empty());
        a.process_exited(1234);
        assert!(registry.pids(&SessionId::new("a")).is_empty());
    }

    #[test]
    fn test_forget_keeps_later_registrations() {
        let registry = ProcessRegistry::new();
        let s = SessionId::new("s1");
        registry.register(&s, 1);
        let targeted = registry.pids(&s);
        registry.register(&s, 2);

        registry.forget(&s, &targeted);
        assert_eq!(registry.pids(&s), vec![2]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_session_kills_process() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let registry = ProcessRegistry::new();
        let s = SessionId::new("s1");
        let pid = child.id().unwrap();
        registry.register(&s, pid);

        assert_eq!(registry.kill_session(&s), vec![pid]);
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
