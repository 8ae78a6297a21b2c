use std::time::{Duration, Instant};

use super::config::ProgressConfig;
use super::parse::{parse_group_marker, parse_percent};
use super::types::{GroupMarker, ProgressUpdate};

/// Converts tool output lines into monotonic, rate-limited progress updates.
///
/// In non-grouped mode the forwarded percentage never decreases. In grouped
/// mode the effective percentage is computed over the whole group as
/// `(completed_files + local / 100) / total`, and a drop is accepted only at
/// a file boundary: the part index changed since the last forwarded update,
/// or the local percentage fell from the reset ceiling to the reset floor.
#[derive(Debug)]
pub struct ProgressTracker {
    config: ProgressConfig,
    grouped: bool,
    /// Latest part index seen on any line.
    index: Option<u32>,
    /// Largest group total seen on any line.
    total: Option<u32>,
    last: Option<Forwarded>,
}

#[derive(Debug, Clone, Copy)]
struct Forwarded {
    effective: u8,
    local: u8,
    index: Option<u32>,
    at: Instant,
}

impl ProgressTracker {
    pub fn new(config: ProgressConfig, grouped: bool) -> Self {
        Self {
            config,
            grouped,
            index: None,
            total: None,
            last: None,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    /// Last forwarded percentage, if any.
    pub fn last_percent(&self) -> Option<u8> {
        self.last.map(|f| f.effective)
    }

    /// Feed one output line. Returns the update to forward, if any.
    pub fn observe(&mut self, line: &str) -> Option<ProgressUpdate> {
        self.observe_at(line, Instant::now())
    }

    /// Same as [`observe`](Self::observe) with an explicit clock reading.
    pub fn observe_at(&mut self, line: &str, now: Instant) -> Option<ProgressUpdate> {
        if self.grouped {
            if let Some(marker) = parse_group_marker(line) {
                self.index = Some(marker.index);
                self.total = Some(self.total.map_or(marker.total, |t| t.max(marker.total)));
            }
        }

        let local = parse_percent(line)?;
        let effective = self.effective(local);

        if let Some(last) = self.last {
            if effective == last.effective {
                return None;
            }
            if effective < last.effective && !self.is_boundary_reset(local, &last) {
                return None;
            }
            let advanced = effective.saturating_sub(last.effective);
            let elapsed = now.saturating_duration_since(last.at);
            if effective < 100
                && advanced < self.config.min_step
                && elapsed < Duration::from_millis(self.config.min_interval_ms)
            {
                return None;
            }
        }

        self.last = Some(Forwarded {
            effective,
            local,
            index: self.index,
            at: now,
        });

        Some(ProgressUpdate {
            percent: effective,
            line: line.to_string(),
            part: self.part(),
        })
    }

    /// Final update after a successful exit: forces 100 unless already reported.
    pub fn finish(&mut self, last_line: &str) -> Option<ProgressUpdate> {
        if self.last_percent() == Some(100) {
            return None;
        }
        self.last = Some(Forwarded {
            effective: 100,
            local: 100,
            index: self.index,
            at: Instant::now(),
        });
        Some(ProgressUpdate {
            percent: 100,
            line: last_line.to_string(),
            part: self.part(),
        })
    }

    fn effective(&self, local: u8) -> u8 {
        let total = match (self.grouped, self.total) {
            (true, Some(total)) if total > 0 => total,
            _ => return local,
        };
        let index = self.index.unwrap_or(1);
        let completed = index.min(total).saturating_sub(1);
        let fraction = (completed as f64 + local as f64 / 100.0) / total as f64;
        (fraction * 100.0).clamp(0.0, 100.0) as u8
    }

    fn is_boundary_reset(&self, local: u8, last: &Forwarded) -> bool {
        if !self.grouped {
            return false;
        }
        let index_changed = self.index.is_some() && self.index != last.index;
        let wrapped = local <= self.config.reset_floor && last.local >= self.config.reset_ceiling;
        index_changed || wrapped
    }

    fn part(&self) -> Option<GroupMarker> {
        match (self.index, self.total) {
            (Some(index), Some(total)) if self.grouped => Some(GroupMarker { index, total }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut ProgressTracker, lines: &[&str]) -> Vec<u8> {
        let start = Instant::now();
        lines
            .iter()
            .enumerate()
            // Space lines two seconds apart so the rate limit never interferes.
            .filter_map(|(i, line)| {
                tracker.observe_at(line, start + Duration::from_secs(2 * i as u64))
            })
            .map(|u| u.percent)
            .collect()
    }

    #[test]
    fn test_regression_is_dropped() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        let forwarded = feed(&mut tracker, &["10%", "45%", "30%", "100%"]);
        assert_eq!(forwarded, vec![10, 45, 100]);
    }

    #[test]
    fn test_equal_value_not_resent() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        let forwarded = feed(&mut tracker, &["50%", "50%", "50.9%"]);
        assert_eq!(forwarded, vec![50]);
    }

    #[test]
    fn test_lines_without_percent_ignored() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        assert!(tracker.observe("resolving message").is_none());
        assert_eq!(tracker.last_percent(), None);
    }

    #[test]
    fn test_rate_limit_small_steps() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        let t0 = Instant::now();
        assert!(tracker.observe_at("10%", t0).is_some());
        // +1 within the interval: suppressed
        assert!(tracker.observe_at("11%", t0 + Duration::from_millis(100)).is_none());
        // +2 within the interval: forwarded
        assert!(tracker.observe_at("12%", t0 + Duration::from_millis(200)).is_some());
        // +1 after the interval: forwarded
        assert!(tracker.observe_at("13%", t0 + Duration::from_millis(1300)).is_some());
    }

    #[test]
    fn test_hundred_always_forwarded() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        let t0 = Instant::now();
        tracker.observe_at("99%", t0);
        let update = tracker.observe_at("100%", t0 + Duration::from_millis(1));
        assert_eq!(update.map(|u| u.percent), Some(100));
    }

    #[test]
    fn test_non_grouped_ignores_markers_and_resets() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        let forwarded = feed(&mut tracker, &["[1/2] 97%", "[2/2] 3%", "[2/2] 60%"]);
        assert_eq!(forwarded, vec![97]);
    }

    #[test]
    fn test_grouped_effective_percent() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), true);
        let forwarded = feed(&mut tracker, &["[1/4] 50%", "[2/4] 0%", "[2/4] 100%", "[4/4] 50%"]);
        // 1/4 * 50% = 12, 1/4 = 25, 2/4 = 50, 3.5/4 = 87
        assert_eq!(forwarded, vec![12, 25, 50, 87]);
    }

    #[test]
    fn test_grouped_total_keeps_max() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), true);
        feed(&mut tracker, &["[1/4] 10%"]);
        let update = tracker.observe_at("[2/2] 10%", Instant::now() + Duration::from_secs(60));
        assert_eq!(
            update.and_then(|u| u.part),
            Some(GroupMarker { index: 2, total: 4 })
        );
    }

    #[test]
    fn test_grouped_reset_on_wrap_without_marker() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), true);
        let forwarded = feed(&mut tracker, &["10%", "96%", "2%", "40%"]);
        assert_eq!(forwarded, vec![10, 96, 2, 40]);
    }

    #[test]
    fn test_grouped_drop_without_boundary_is_dropped() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), true);
        let forwarded = feed(&mut tracker, &["[1/1] 60%", "[1/1] 30%", "[1/1] 70%"]);
        assert_eq!(forwarded, vec![60, 70]);
    }

    #[test]
    fn test_finish_forces_hundred_once() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        tracker.observe("40%");
        let update = tracker.finish("done").unwrap();
        assert_eq!(update.percent, 100);
        assert_eq!(update.line, "done");
        assert!(tracker.finish("done").is_none());
    }

    #[test]
    fn test_finish_after_hundred_is_noop() {
        let mut tracker = ProgressTracker::new(ProgressConfig::default(), false);
        tracker.observe("100%");
        assert!(tracker.finish("done").is_none());
    }
}
