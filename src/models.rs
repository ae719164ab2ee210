use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage key prefix for course-scoped state rows. Other features share the
/// `user_state` table under their own prefixes.
pub const COURSE_MODULE_PREFIX: &str = "course:";

/// One row per assignment in a course, joined with the student's homework
/// record for that assignment. Assignments the student never touched carry
/// the default record.
#[derive(Debug, Clone, Default)]
pub struct HomeworkRecord {
    pub completed: bool,
    pub score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentHomeworkAggregate {
    pub total_homework: usize,
    pub completed_homework: usize,
    pub average_score: f64,
    pub streak_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffortStatus {
    Excellent,
    Good,
    Neutral,
    Concerned,
    AtRisk,
}

impl EffortStatus {
    /// Descending ladder, first matching band wins.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => EffortStatus::Excellent,
            60..=79 => EffortStatus::Good,
            40..=59 => EffortStatus::Neutral,
            20..=39 => EffortStatus::Concerned,
            _ => EffortStatus::AtRisk,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            EffortStatus::Excellent => "😄",
            EffortStatus::Good => "🙂",
            EffortStatus::Neutral => "😐",
            EffortStatus::Concerned => "😟",
            EffortStatus::AtRisk => "😡",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EffortStatus::Excellent => "excellent",
            EffortStatus::Good => "good",
            EffortStatus::Neutral => "neutral",
            EffortStatus::Concerned => "concerned",
            EffortStatus::AtRisk => "at-risk",
        }
    }

    pub fn needs_reminder(&self) -> bool {
        matches!(self, EffortStatus::Concerned | EffortStatus::AtRisk)
    }
}

impl std::fmt::Display for EffortStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Composite effort result with its component breakdown. All components are
/// on a 0-100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct EffortScore {
    pub score: u8,
    pub completion_rate: f64,
    pub average_quiz_score: f64,
    pub streak_score: f64,
    pub status: EffortStatus,
}

/// State-partition key. Course-scoped state serializes as `course:<uuid>`;
/// anything else round-trips untouched so foreign rows stay representable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleRef {
    Course(Uuid),
    Other(String),
}

impl ModuleRef {
    pub fn course(course_id: Uuid) -> Self {
        ModuleRef::Course(course_id)
    }

    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(COURSE_MODULE_PREFIX) {
            Some(rest) => match Uuid::parse_str(rest) {
                Ok(id) => ModuleRef::Course(id),
                Err(_) => ModuleRef::Other(raw.to_string()),
            },
            None => ModuleRef::Other(raw.to_string()),
        }
    }

    pub fn as_course(&self) -> Option<Uuid> {
        match self {
            ModuleRef::Course(id) => Some(*id),
            ModuleRef::Other(_) => None,
        }
    }
}

impl std::fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleRef::Course(id) => write!(f, "{COURSE_MODULE_PREFIX}{id}"),
            ModuleRef::Other(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CourseInfo {
    pub id: Uuid,
    pub title: String,
    pub tutor_id: Uuid,
}

/// Raw state-store row joined with the owning user's identity.
#[derive(Debug, Clone)]
pub struct EffortStateRow {
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub module: String,
    pub blob: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtRiskEntry {
    pub user_id: Uuid,
    pub user_name: String,
    pub course_id: Uuid,
    pub course_name: String,
    pub effort_score: u8,
    pub status: EffortStatus,
}

#[derive(Debug, Clone)]
pub struct StatusSummary {
    pub status: EffortStatus,
    pub count: usize,
    pub avg_effort: f64,
}

#[derive(Debug, Clone)]
pub struct CourseSummary {
    pub course_name: String,
    pub flagged: usize,
    pub worst_effort: u8,
}
