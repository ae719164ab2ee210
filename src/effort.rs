use chrono::{DateTime, Duration, Utc};

use crate::models::{EffortScore, EffortStatus, HomeworkRecord, StudentHomeworkAggregate};

/// Submissions inside this trailing window count toward the streak.
pub const STREAK_WINDOW_DAYS: i64 = 7;

const COMPLETION_WEIGHT: f64 = 0.5;
const QUIZ_WEIGHT: f64 = 0.3;
const STREAK_WEIGHT: f64 = 0.2;

/// Reduce a student's per-assignment homework records to the scoring inputs.
///
/// `records` holds one entry per assignment in the course, so the total is
/// the assignment count even when the student never opened half of them.
pub fn aggregate(records: &[HomeworkRecord], now: DateTime<Utc>) -> StudentHomeworkAggregate {
    let completed_homework = records.iter().filter(|record| record.completed).count();

    let scored: Vec<f64> = records
        .iter()
        .filter(|record| record.completed)
        .filter_map(|record| record.score)
        .collect();
    let average_score = if scored.is_empty() {
        0.0
    } else {
        scored.iter().sum::<f64>() / scored.len() as f64
    };

    // Submission count in the trailing week stands in for a daily streak;
    // consecutive-day activity is not tracked.
    let cutoff = now - Duration::days(STREAK_WINDOW_DAYS);
    let recent_submissions = records
        .iter()
        .filter(|record| record.submitted_at.is_some_and(|at| at >= cutoff))
        .count();

    StudentHomeworkAggregate {
        total_homework: records.len(),
        completed_homework,
        average_score,
        streak_days: recent_submissions.min(STREAK_WINDOW_DAYS as usize) as u32,
    }
}

/// Composite effort score with classification. Pure and deterministic.
pub fn score(aggregate: &StudentHomeworkAggregate) -> EffortScore {
    let completion_rate = if aggregate.total_homework > 0 {
        aggregate.completed_homework as f64 / aggregate.total_homework as f64 * 100.0
    } else {
        0.0
    };
    let average_quiz_score = aggregate.average_score;
    let streak_score =
        aggregate.streak_days.min(STREAK_WINDOW_DAYS as u32) as f64 / STREAK_WINDOW_DAYS as f64
            * 100.0;

    let score = weighted_total(completion_rate, average_quiz_score, streak_score);

    EffortScore {
        score,
        completion_rate,
        average_quiz_score,
        streak_score,
        status: EffortStatus::from_score(score),
    }
}

// Upstream grading can leak values outside 0-100; clamp before rounding.
fn weighted_total(completion_rate: f64, average_quiz_score: f64, streak_score: f64) -> u8 {
    let raw = COMPLETION_WEIGHT * completion_rate
        + QUIZ_WEIGHT * average_quiz_score
        + STREAK_WEIGHT * streak_score;
    raw.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(score: f64, days_ago: i64) -> HomeworkRecord {
        HomeworkRecord {
            completed: true,
            score: Some(score),
            submitted_at: Some(Utc::now() - Duration::days(days_ago)),
        }
    }

    fn untouched() -> HomeworkRecord {
        HomeworkRecord::default()
    }

    #[test]
    fn weighted_formula_is_exact() {
        assert_eq!(weighted_total(100.0, 100.0, 100.0), 100);
        assert_eq!(weighted_total(0.0, 0.0, 0.0), 0);
        assert_eq!(weighted_total(80.0, 70.0, 50.0), 71);
    }

    #[test]
    fn weighted_total_clamps_leaked_overshoot() {
        assert_eq!(weighted_total(150.0, 150.0, 150.0), 100);
        assert_eq!(weighted_total(-20.0, 0.0, 0.0), 0);
    }

    #[test]
    fn classification_ladder_boundaries() {
        assert_eq!(EffortStatus::from_score(80), EffortStatus::Excellent);
        assert_eq!(EffortStatus::from_score(79), EffortStatus::Good);
        assert_eq!(EffortStatus::from_score(60), EffortStatus::Good);
        assert_eq!(EffortStatus::from_score(59), EffortStatus::Neutral);
        assert_eq!(EffortStatus::from_score(40), EffortStatus::Neutral);
        assert_eq!(EffortStatus::from_score(39), EffortStatus::Concerned);
        assert_eq!(EffortStatus::from_score(20), EffortStatus::Concerned);
        assert_eq!(EffortStatus::from_score(19), EffortStatus::AtRisk);
    }

    #[test]
    fn score_is_bounded_and_deterministic() {
        let aggregate = StudentHomeworkAggregate {
            total_homework: 5,
            completed_homework: 3,
            average_score: 62.0,
            streak_days: 2,
        };
        let first = score(&aggregate);
        let second = score(&aggregate);
        assert_eq!(first, second);
        assert!(first.score <= 100);
    }

    #[test]
    fn empty_course_scores_zero_without_dividing() {
        let aggregate = aggregate_of(&[]);
        assert_eq!(aggregate.total_homework, 0);
        let result = score(&aggregate);
        assert_eq!(result.completion_rate, 0.0);
        assert_eq!(result.score, 0);
        assert_eq!(result.status, EffortStatus::AtRisk);
    }

    fn aggregate_of(records: &[HomeworkRecord]) -> StudentHomeworkAggregate {
        aggregate(records, Utc::now())
    }

    #[test]
    fn average_ignores_incomplete_and_unscored_homework() {
        let records = vec![
            completed(90.0, 20),
            completed(70.0, 20),
            HomeworkRecord {
                completed: true,
                score: None,
                submitted_at: None,
            },
            HomeworkRecord {
                completed: false,
                score: Some(10.0),
                submitted_at: None,
            },
            untouched(),
        ];
        let aggregate = aggregate_of(&records);
        assert_eq!(aggregate.total_homework, 5);
        assert_eq!(aggregate.completed_homework, 3);
        assert!((aggregate.average_score - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn streak_counts_only_the_trailing_week_and_clamps() {
        let mut records: Vec<HomeworkRecord> = (0..9).map(|_| completed(50.0, 1)).collect();
        records.push(completed(50.0, 30));
        let aggregate = aggregate_of(&records);
        assert_eq!(aggregate.streak_days, 7);

        let records = vec![completed(50.0, 2), completed(50.0, 3), completed(50.0, 40)];
        let aggregate = aggregate_of(&records);
        assert_eq!(aggregate.streak_days, 2);
    }

    #[test]
    fn end_to_end_scenario_lands_on_good() {
        // 10 assignments, 8 completed averaging 75, 3 submitted this week.
        let mut records = vec![
            completed(70.0, 2),
            completed(80.0, 3),
            completed(75.0, 5),
            completed(75.0, 12),
            completed(70.0, 14),
            completed(80.0, 16),
            completed(75.0, 20),
            completed(75.0, 25),
        ];
        records.push(untouched());
        records.push(untouched());

        let aggregate = aggregate_of(&records);
        assert_eq!(aggregate.total_homework, 10);
        assert_eq!(aggregate.completed_homework, 8);
        assert!((aggregate.average_score - 75.0).abs() < f64::EPSILON);
        assert_eq!(aggregate.streak_days, 3);

        let result = score(&aggregate);
        assert!((result.completion_rate - 80.0).abs() < f64::EPSILON);
        assert!((result.streak_score - 3.0 / 7.0 * 100.0).abs() < 1e-9);
        assert_eq!(result.score, 71);
        assert_eq!(result.status, EffortStatus::Good);
        assert_eq!(result.status.emoji(), "🙂");
        assert!(!result.status.needs_reminder());
    }
}
