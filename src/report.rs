use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AtRiskEntry, CourseSummary, StatusSummary};

pub fn build_report(
    scope: Option<&str>,
    generated_at: DateTime<Utc>,
    summaries: &[StatusSummary],
    entries: &[AtRiskEntry],
    hotspots: &[CourseSummary],
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all courses");

    let _ = writeln!(output, "# Student Effort Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label,
        generated_at.date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No effort states recorded yet.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students (avg effort {:.1})",
                summary.status, summary.count, summary.avg_effort
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");

    if entries.is_empty() {
        let _ = writeln!(output, "No students below the concern threshold.");
    } else {
        for entry in entries.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} {} ({}) effort {} ({})",
                entry.status.emoji(),
                entry.user_name,
                entry.course_name,
                entry.effort_score,
                entry.status
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Hotspots");

    if hotspots.is_empty() {
        let _ = writeln!(output, "No courses with flagged students.");
    } else {
        for hotspot in hotspots.iter().take(5) {
            let _ = writeln!(
                output,
                "- {}: {} flagged (worst effort {})",
                hotspot.course_name, hotspot.flagged, hotspot.worst_effort
            );
        }
    }

    output
}
