use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::GroupMarker;

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})(?:\.\d+)?%").unwrap());

static GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s\[])(\d{1,3})/(\d{1,3})(?:[\]\s]|$)").unwrap());

/// Extract the percentage from a line of tool output.
///
/// Tools often print a per-file and an overall bar on the same line, so the
/// last match wins. The fractional part is truncated and values are clamped
/// to 100.
pub fn parse_percent(line: &str) -> Option<u8> {
    let caps = PERCENT_RE.captures_iter(line).last()?;
    let value: u32 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.min(100) as u8)
}

/// Extract an `index/total` part marker, e.g. `[3/12]`.
///
/// Markers with a zero total are ignored.
pub fn parse_group_marker(line: &str) -> Option<GroupMarker> {
    let caps = GROUP_RE.captures(line)?;
    let index: u32 = caps.get(1)?.as_str().parse().ok()?;
    let total: u32 = caps.get(2)?.as_str().parse().ok()?;
    if total == 0 {
        return None;
    }
    Some(GroupMarker { index, total })
}
