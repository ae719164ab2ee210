use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::models::{
    AtRiskEntry, CourseInfo, CourseSummary, EffortStateRow, EffortStatus, ModuleRef, StatusSummary,
};
use crate::state;

/// Build the at-risk roster from a raw state scan: concerned/at-risk students
/// joined against their courses, worst effort first.
///
/// Rows that cannot be used are dropped, never surfaced as errors: modules
/// outside the course prefix, blobs written by other features, and state
/// whose course has since been deleted.
pub fn build_roster(
    rows: &[EffortStateRow],
    courses: &[CourseInfo],
    tutor_id: Option<Uuid>,
) -> Vec<AtRiskEntry> {
    let courses_by_id: HashMap<Uuid, &CourseInfo> =
        courses.iter().map(|course| (course.id, course)).collect();

    let mut entries = Vec::new();
    for row in rows {
        let Some(course_id) = ModuleRef::parse(&row.module).as_course() else {
            continue;
        };
        let Ok(parsed) = state::parse_state(&row.blob) else {
            debug!(user = %row.user_id, module = %row.module, "skipping non-effort state row");
            continue;
        };
        if !matches!(parsed.status, EffortStatus::Concerned | EffortStatus::AtRisk) {
            continue;
        }
        let Some(course) = courses_by_id.get(&course_id) else {
            debug!(%course_id, "skipping state for deleted course");
            continue;
        };
        if tutor_id.is_some_and(|id| course.tutor_id != id) {
            continue;
        }

        let user_name = row
            .user_name
            .clone()
            .or_else(|| row.user_email.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        entries.push(AtRiskEntry {
            user_id: row.user_id,
            user_name,
            course_id,
            course_name: course.title.clone(),
            effort_score: parsed.effort,
            status: parsed.status,
        });
    }

    // Lowest effort first so tutors see the worst cases at the top.
    entries.sort_by_key(|entry| entry.effort_score);
    entries
}

/// Status mix across all course-scoped effort states, most common first.
pub fn summarize_by_status(rows: &[EffortStateRow]) -> Vec<StatusSummary> {
    let mut map: HashMap<EffortStatus, (usize, u64)> = HashMap::new();

    for row in rows {
        if ModuleRef::parse(&row.module).as_course().is_none() {
            continue;
        }
        let Ok(parsed) = state::parse_state(&row.blob) else {
            continue;
        };
        let entry = map.entry(parsed.status).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += u64::from(parsed.effort);
    }

    let mut summaries: Vec<StatusSummary> = map
        .into_iter()
        .map(|(status, (count, total_effort))| StatusSummary {
            status,
            count,
            avg_effort: if count == 0 {
                0.0
            } else {
                total_effort as f64 / count as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Flagged-student count per course, busiest course first.
pub fn summarize_by_course(entries: &[AtRiskEntry]) -> Vec<CourseSummary> {
    let mut map: HashMap<&str, (usize, u8)> = HashMap::new();

    for entry in entries {
        let summary = map
            .entry(entry.course_name.as_str())
            .or_insert((0, entry.effort_score));
        summary.0 += 1;
        summary.1 = summary.1.min(entry.effort_score);
    }

    let mut summaries: Vec<CourseSummary> = map
        .into_iter()
        .map(|(course_name, (flagged, worst_effort))| CourseSummary {
            course_name: course_name.to_string(),
            flagged,
            worst_effort,
        })
        .collect();

    summaries.sort_by(|a, b| b.flagged.cmp(&a.flagged));
    summaries
}
