use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AtRiskEntry, EffortScore, ModuleRef};
use crate::repo::{CourseRepository, EffortStateRepository, HomeworkRepository};
use crate::state::{self, EffortState};
use crate::{effort, roster};

/// Recompute a student's effort for one course and merge it into the stored
/// state. Racing writers are last-write-wins; recomputation from source
/// homework is idempotent, so a stale overwrite self-corrects on the next run.
pub async fn recompute<H, S>(
    homework: &H,
    store: &S,
    user_id: Uuid,
    course_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<(EffortScore, EffortState)>
where
    H: HomeworkRepository,
    S: EffortStateRepository,
{
    let records = homework
        .course_homework(user_id, course_id)
        .await
        .context("failed to load homework records")?;
    let aggregate = effort::aggregate(&records, now);
    let score = effort::score(&aggregate);

    let module = ModuleRef::course(course_id).to_string();
    let existing = store
        .load(user_id, &module)
        .await
        .context("failed to load stored effort state")?;
    let (blob, merged) = state::merge_blob(existing.as_deref(), &score, now)?;
    store
        .save(user_id, &module, &blob)
        .await
        .context("failed to persist effort state")?;

    info!(
        user = %user_id,
        course = %course_id,
        score = score.score,
        status = %score.status,
        "effort recomputed"
    );
    Ok((score, merged))
}

/// Return the stored effort state verbatim, computing and persisting it first
/// if the key has never been scored.
pub async fn get_or_compute<H, S>(
    homework: &H,
    store: &S,
    user_id: Uuid,
    module: &ModuleRef,
    now: DateTime<Utc>,
) -> anyhow::Result<EffortState>
where
    H: HomeworkRepository,
    S: EffortStateRepository,
{
    let key = module.to_string();
    if let Some(raw) = store
        .load(user_id, &key)
        .await
        .context("failed to load stored effort state")?
    {
        return state::parse_state(&raw);
    }

    let Some(course_id) = module.as_course() else {
        bail!("module '{key}' is not course-scoped and cannot be computed");
    };
    debug!(user = %user_id, %course_id, "no stored effort state, computing fresh");
    let (_, merged) = recompute(homework, store, user_id, course_id, now).await?;
    Ok(merged)
}

/// At-risk roster across all stored course states, optionally narrowed to one
/// tutor's courses.
pub async fn at_risk_roster<C, S>(
    courses: &C,
    store: &S,
    tutor_id: Option<Uuid>,
) -> anyhow::Result<Vec<AtRiskEntry>>
where
    C: CourseRepository,
    S: EffortStateRepository,
{
    let rows = store
        .course_states()
        .await
        .context("failed to scan effort states")?;
    let courses = courses
        .all_courses()
        .await
        .context("failed to load courses")?;
    debug!(states = rows.len(), courses = courses.len(), "building at-risk roster");
    Ok(roster::build_roster(&rows, &courses, tutor_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseInfo, EffortStatus, HomeworkRecord};
    use crate::repo::mem::MemStore;
    use chrono::Duration;

    fn full_marks(now: DateTime<Utc>) -> Vec<HomeworkRecord> {
        (0..8)
            .map(|_| HomeworkRecord {
                completed: true,
                score: Some(100.0),
                submitted_at: Some(now - Duration::days(1)),
            })
            .collect()
    }

    #[tokio::test]
    async fn get_computes_and_persists_when_absent() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let course = Uuid::new_v4();
        let now = Utc::now();
        store.put_homework(user, course, vec![]);

        let module = ModuleRef::course(course);
        let state = get_or_compute(&store, &store, user, &module, now)
            .await
            .unwrap();
        assert_eq!(state.effort, 0);
        assert_eq!(state.status, EffortStatus::AtRisk);
        assert!(state.needs_reminder);

        let stored = store.load(user, &module.to_string()).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn get_returns_stored_state_without_rescoring() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let course = Uuid::new_v4();
        let now = Utc::now();
        // homework would score 100, but the stored state must win
        store.put_homework(user, course, full_marks(now));
        let module = ModuleRef::course(course);
        store.put_state(
            user,
            &module.to_string(),
            r#"{"effort":55,"emoji":"😐","status":"neutral","lastCalculated":"2026-02-01T08:00:00Z","needsReminder":false}"#,
        );

        let state = get_or_compute(&store, &store, user, &module, now)
            .await
            .unwrap();
        assert_eq!(state.effort, 55);
        assert_eq!(state.status, EffortStatus::Neutral);
    }

    #[tokio::test]
    async fn get_rejects_non_course_modules() {
        let store = MemStore::default();
        let module = ModuleRef::Other("chat:session-1".to_string());
        let result = get_or_compute(&store, &store, Uuid::new_v4(), &module, Utc::now()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn recompute_merges_without_clobbering_foreign_keys() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let course = Uuid::new_v4();
        let now = Utc::now();
        store.put_homework(user, course, full_marks(now));
        let module = ModuleRef::course(course).to_string();
        store.put_state(user, &module, r#"{"foo":"bar","effort":10}"#);

        let (score, merged) = recompute(&store, &store, user, course, now).await.unwrap();
        assert_eq!(score.score, 100);
        assert_eq!(score.status, EffortStatus::Excellent);
        assert_eq!(
            merged.extra.get("foo"),
            Some(&serde_json::Value::from("bar"))
        );

        let stored = store.load(user, &module).await.unwrap().unwrap();
        let parsed = state::parse_state(&stored).unwrap();
        assert_eq!(parsed.effort, 100);
        assert_eq!(parsed.extra.get("foo"), Some(&serde_json::Value::from("bar")));
    }

    #[tokio::test]
    async fn recompute_is_idempotent_for_a_fixed_instant() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let course = Uuid::new_v4();
        let now = Utc::now();
        store.put_homework(user, course, full_marks(now));

        let (first, _) = recompute(&store, &store, user, course, now).await.unwrap();
        let blob_after_first = store
            .load(user, &ModuleRef::course(course).to_string())
            .await
            .unwrap();
        let (second, _) = recompute(&store, &store, user, course, now).await.unwrap();
        let blob_after_second = store
            .load(user, &ModuleRef::course(course).to_string())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(blob_after_first, blob_after_second);
    }

    #[tokio::test]
    async fn roster_runs_end_to_end_with_tutor_filter() {
        let store = MemStore::default();
        let now = Utc::now();
        let tutor_a = Uuid::new_v4();
        let tutor_b = Uuid::new_v4();
        let course_a = CourseInfo {
            id: Uuid::new_v4(),
            title: "Algebra".to_string(),
            tutor_id: tutor_a,
        };
        let course_b = CourseInfo {
            id: Uuid::new_v4(),
            title: "Biology".to_string(),
            tutor_id: tutor_b,
        };
        store.put_course(course_a.clone());
        store.put_course(course_b.clone());

        let slacker = Uuid::new_v4();
        let striver = Uuid::new_v4();
        store.put_user(slacker, Some("Jules Moreno"), Some("jules@futuropal.io"));
        store.put_user(striver, Some("Avery Lee"), Some("avery@futuropal.io"));

        // no homework at all in course A, full marks in course B
        store.put_homework(slacker, course_a.id, vec![]);
        store.put_homework(striver, course_b.id, full_marks(now));

        recompute(&store, &store, slacker, course_a.id, now)
            .await
            .unwrap();
        recompute(&store, &store, striver, course_b.id, now)
            .await
            .unwrap();

        let all = at_risk_roster(&store, &store, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].user_name, "Jules Moreno");
        assert_eq!(all[0].effort_score, 0);

        let filtered = at_risk_roster(&store, &store, Some(tutor_b)).await.unwrap();
        assert!(filtered.is_empty());
    }
}
