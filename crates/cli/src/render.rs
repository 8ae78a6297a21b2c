//! Text rendering of job events and queue views.

use std::fmt::Write;

use plexdl_core::{ContentSnapshot, ContentSummary, JobEvent, JobOutcome, QueueSnapshot};

const BAR_LEN: usize = 20;

/// `[██████░░░░░░░░░░░░░░]` for 30%.
pub fn progress_bar(percent: u8) -> String {
    let filled = BAR_LEN * usize::from(percent.min(100)) / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_LEN - filled))
}

pub fn render_event(event: &JobEvent) -> String {
    match event {
        JobEvent::Started {
            task_id,
            session_id,
            label,
        } => format!("[{}] #{} ▶️ Starting: {}", session_id, task_id, label),
        JobEvent::Progress {
            task_id,
            session_id,
            label,
            update,
        } => {
            let mut line = format!(
                "[{}] #{} ⬇️ {} {} {}%",
                session_id,
                task_id,
                label,
                progress_bar(update.percent),
                update.percent
            );
            if let Some(part) = update.part {
                let _ = write!(line, " (file {}/{})", part.index, part.total);
            }
            line
        }
        JobEvent::Finished {
            task_id,
            session_id,
            label,
            destination,
            outcome,
        } => match outcome {
            JobOutcome::Completed { post_processed } => {
                let mut line = format!(
                    "[{}] #{} ✅ Done: {} -> {}",
                    session_id,
                    task_id,
                    label,
                    destination.display()
                );
                if !post_processed {
                    line.push_str(" (post-processing deferred)");
                }
                line
            }
            JobOutcome::Failed { removed_files } => format!(
                "[{}] #{} ❌ Download failed: {} ({} partial files removed)",
                session_id, task_id, label, removed_files
            ),
            JobOutcome::Cancelled => {
                format!("[{}] #{} ⛔️ Cancelled: {}", session_id, task_id, label)
            }
        },
    }
}

pub fn render_queue(snapshot: &QueueSnapshot) -> String {
    if snapshot.current.is_none() && snapshot.queued.is_empty() {
        return "Queue is empty.".to_string();
    }
    let mut out = String::new();
    if let Some(current) = &snapshot.current {
        let _ = writeln!(
            out,
            "Running: #{} {} [{}]",
            current.id, current.label, current.session_id
        );
    }
    for (position, task) in snapshot.queued.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. #{} {} [{}]",
            position + 1,
            task.id,
            task.label,
            task.session_id
        );
    }
    out.trim_end().to_string()
}

fn summary_line(summary: &ContentSummary) -> String {
    format!(
        "#{} {} [{}] {} part(s), {} pending -> {}",
        summary.representative_task_id,
        summary.label,
        summary.session_id,
        summary.total,
        summary.pending(),
        summary.destination
    )
}

pub fn render_content(snapshot: &ContentSnapshot) -> String {
    if snapshot.running.is_none() && snapshot.queued.is_empty() {
        return "Nothing queued.".to_string();
    }
    let mut out = String::new();
    if let Some(running) = &snapshot.running {
        let _ = writeln!(out, "Running: {}", summary_line(running));
    }
    for (position, summary) in snapshot.queued.iter().enumerate() {
        let _ = writeln!(out, "{:>3}. {}", position + 1, summary_line(summary));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexdl_core::progress::GroupMarker;
    use plexdl_core::{ProgressUpdate, SessionId, TaskId};
    use std::path::PathBuf;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), format!("[{}]", "░".repeat(20)));
        assert_eq!(progress_bar(100), format!("[{}]", "█".repeat(20)));
        assert_eq!(
            progress_bar(30),
            format!("[{}{}]", "█".repeat(6), "░".repeat(14))
        );
        assert_eq!(progress_bar(250), progress_bar(100));
    }

    #[test]
    fn test_render_progress_with_part() {
        let event = JobEvent::Progress {
            task_id: TaskId(3),
            session_id: SessionId::new("1"),
            label: "show".to_string(),
            update: ProgressUpdate {
                percent: 55,
                line: "2/4 10%".to_string(),
                part: Some(GroupMarker { index: 2, total: 4 }),
            },
        };
        let line = render_event(&event);
        assert!(line.contains("55%"));
        assert!(line.ends_with("(file 2/4)"));
    }

    #[test]
    fn test_render_finished() {
        let event = JobEvent::Finished {
            task_id: TaskId(3),
            session_id: SessionId::new("1"),
            label: "show".to_string(),
            destination: PathBuf::from("/media/Show"),
            outcome: JobOutcome::Completed {
                post_processed: false,
            },
        };
        assert!(render_event(&event).ends_with("(post-processing deferred)"));
    }

    #[test]
    fn test_render_empty_views() {
        assert_eq!(render_queue(&QueueSnapshot::default()), "Queue is empty.");
        assert_eq!(render_content(&ContentSnapshot::default()), "Nothing queued.");
    }
}
