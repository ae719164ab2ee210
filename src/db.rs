use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{CourseInfo, EffortStateRow, HomeworkRecord, COURSE_MODULE_PREFIX};
use crate::repo::{CourseRepository, EffortStateRepository, HomeworkRepository};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed implementation of the three repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HomeworkRepository for PgStore {
    async fn course_homework(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<Vec<HomeworkRecord>> {
        // LEFT JOIN keeps untouched assignments in the total.
        let rows = sqlx::query(
            "SELECT COALESCE(h.completed, FALSE) AS completed, h.score, h.submitted_at \
             FROM effort_tracker.assignments a \
             LEFT JOIN effort_tracker.homework h \
             ON h.assignment_id = a.id AND h.user_id = $2 \
             WHERE a.course_id = $1",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::new();
        for row in rows {
            records.push(HomeworkRecord {
                completed: row.get("completed"),
                score: row.get("score"),
                submitted_at: row.get("submitted_at"),
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl CourseRepository for PgStore {
    async fn all_courses(&self) -> anyhow::Result<Vec<CourseInfo>> {
        let rows = sqlx::query("SELECT id, title, tutor_id FROM effort_tracker.courses")
            .fetch_all(&self.pool)
            .await?;

        let mut courses = Vec::new();
        for row in rows {
            courses.push(CourseInfo {
                id: row.get("id"),
                title: row.get("title"),
                tutor_id: row.get("tutor_id"),
            });
        }
        Ok(courses)
    }
}

#[async_trait]
impl EffortStateRepository for PgStore {
    async fn load(&self, user_id: Uuid, module: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            "SELECT value FROM effort_tracker.user_state WHERE user_id = $1 AND module = $2",
        )
        .bind(user_id)
        .bind(module)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn save(&self, user_id: Uuid, module: &str, blob: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO effort_tracker.user_state (user_id, module, value, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, module) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(module)
        .bind(blob)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn course_states(&self) -> anyhow::Result<Vec<EffortStateRow>> {
        let pattern = format!("{COURSE_MODULE_PREFIX}%");
        let rows = sqlx::query(
            "SELECT us.user_id, u.full_name, u.email, us.module, us.value \
             FROM effort_tracker.user_state us \
             LEFT JOIN effort_tracker.users u ON u.id = us.user_id \
             WHERE us.module LIKE $1",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        let mut states = Vec::new();
        for row in rows {
            states.push(EffortStateRow {
                user_id: row.get("user_id"),
                user_name: row.get("full_name"),
                user_email: row.get("email"),
                module: row.get("module"),
                blob: row.get("value"),
            });
        }
        Ok(states)
    }
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM effort_tracker.users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no user with email {email}"))?;
    Ok(row.get("id"))
}

async fn upsert_user(pool: &PgPool, name: Option<&str>, email: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO effort_tracker.users (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = COALESCE(EXCLUDED.full_name, effort_tracker.users.full_name)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_course(pool: &PgPool, title: &str, tutor_id: Uuid) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO effort_tracker.courses (id, title, tutor_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (title) DO UPDATE
        SET tutor_id = EXCLUDED.tutor_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(tutor_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_assignment(pool: &PgPool, course_id: Uuid, title: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO effort_tracker.assignments (id, course_id, title)
        VALUES ($1, $2, $3)
        ON CONFLICT (course_id, title) DO UPDATE
        SET title = EXCLUDED.title
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(course_id)
    .bind(title)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_homework(
    pool: &PgPool,
    assignment_id: Uuid,
    user_id: Uuid,
    completed: bool,
    score: Option<f64>,
    submitted_at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO effort_tracker.homework
        (id, assignment_id, user_id, completed, score, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (assignment_id, user_id) DO UPDATE
        SET completed = EXCLUDED.completed,
            score = EXCLUDED.score,
            submitted_at = EXCLUDED.submitted_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(assignment_id)
    .bind(user_id)
    .bind(completed)
    .bind(score)
    .bind(submitted_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let tutor = upsert_user(pool, Some("Priya Raman"), "priya.raman@futuropal.io").await?;

    let students = vec![
        (Some("Avery Lee"), "avery.lee@futuropal.io"),
        (Some("Jules Moreno"), "jules.moreno@futuropal.io"),
        (Some("Kiara Patel"), "kiara.patel@futuropal.io"),
    ];
    let mut student_ids = Vec::new();
    for (name, email) in students {
        student_ids.push(upsert_user(pool, name, email).await?);
    }

    let rust = upsert_course(pool, "Intro to Rust", tutor).await?;
    let data = upsert_course(pool, "Data Structures", tutor).await?;

    let mut rust_assignments = Vec::new();
    for title in [
        "Ownership basics",
        "Error handling",
        "Traits and generics",
        "Async fundamentals",
    ] {
        rust_assignments.push(upsert_assignment(pool, rust, title).await?);
    }
    for title in ["Linked lists", "Hash maps", "Graph traversal"] {
        upsert_assignment(pool, data, title).await?;
    }

    let now = Utc::now();
    let avery = student_ids[0];
    let jules = student_ids[1];

    // Avery: everything done, graded well, submitting this week.
    let avery_scores = [92.0, 88.0, 95.0, 85.0];
    for (assignment, score) in rust_assignments.iter().zip(avery_scores) {
        upsert_homework(
            pool,
            *assignment,
            avery,
            true,
            Some(score),
            Some(now - Duration::days(2)),
        )
        .await?;
    }

    // Jules: one early submission, then silence.
    upsert_homework(
        pool,
        rust_assignments[0],
        jules,
        true,
        Some(50.0),
        Some(now - Duration::days(20)),
    )
    .await?;

    // Kiara has no homework rows at all.

    Ok(())
}

pub struct ImportOutcome {
    pub records: usize,
    /// Distinct (student, course) pairs the import touched.
    pub touched: Vec<(Uuid, Uuid)>,
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<ImportOutcome> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_name: Option<String>,
        student_email: String,
        course_title: String,
        tutor_email: String,
        assignment_title: String,
        completed: bool,
        score: Option<f64>,
        submitted_at: Option<DateTime<Utc>>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut records = 0usize;
    let mut touched = HashSet::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let tutor_id = upsert_user(pool, None, &row.tutor_email).await?;
        let student_id = upsert_user(pool, row.student_name.as_deref(), &row.student_email).await?;
        let course_id = upsert_course(pool, &row.course_title, tutor_id).await?;
        let assignment_id = upsert_assignment(pool, course_id, &row.assignment_title).await?;

        upsert_homework(
            pool,
            assignment_id,
            student_id,
            row.completed,
            row.score,
            row.submitted_at,
        )
        .await?;

        touched.insert((student_id, course_id));
        records += 1;
    }

    let mut touched: Vec<(Uuid, Uuid)> = touched.into_iter().collect();
    touched.sort();
    Ok(ImportOutcome { records, touched })
}
